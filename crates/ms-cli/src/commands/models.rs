use comfy_table::{ContentArrangement, Table};

use crate::models::MODELS;

pub fn run() -> Result<(), String> {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Model", "Horizon", "Description"]);

    for model in MODELS {
        table.add_row(vec![
            model.name.to_string(),
            format!("{}", model.horizon),
            model.description.to_string(),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} models", MODELS.len());

    Ok(())
}

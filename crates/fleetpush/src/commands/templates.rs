use comfy_table::Table;
use fleetpush_core::all_templates;

pub fn render_templates() -> Table {
    let mut table = super::table(["ID", "Name", "Variables", "Source"]);
    for template in all_templates() {
        table.add_row(vec![
            template.id.to_string(),
            format!("{}\n{}", template.name, template.description),
            template.default_variables.join(", "),
            template.source_url.to_string(),
        ]);
    }
    table
}

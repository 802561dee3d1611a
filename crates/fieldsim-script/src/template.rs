//! Starter script generation.

use std::path::Path;

use fieldsim_tags::TagStore;
use tracing::info;

/// A starter script listing every tag in `store` with empty `init` and
/// `run_logic` hooks.
pub fn render_template(store: &TagStore, table_name: &str) -> String {
    let listing: String = store
        .iter()
        .map(|tag| {
            format!(
                "  {table_name}.{:<32} -- {} ({}, {})\n",
                tag.name(),
                tag.description(),
                tag.address(),
                tag.kind(),
            )
        })
        .collect();
    let count = store.len();
    format!(
        r#"-- PLC logic script (generated template)
-- run_logic() is called once per scan.

--[[ Available tags
{listing}]]

scan_count = scan_count or 0

function init()
    log("logic initialized with {count} tags")
end

function run_logic()
    scan_count = scan_count + 1

    -- Example:
    -- if {table_name}.Tank1_Temperature > 50 then
    --     {table_name}.Heater_Relay = false
    -- end
end

function clamp(value, lo, hi)
    if value < lo then return lo end
    if value > hi then return hi end
    return value
end
"#
    )
}

/// Write the starter script to `path` unless a file already exists there.
/// Returns whether a file was written.
pub fn write_template_if_missing(
    path: &Path,
    store: &TagStore,
    table_name: &str,
) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, render_template(store, table_name))?;
    info!(path = %path.display(), tags = store.len(), "script template written");
    Ok(true)
}

use crate::config::Config;
use crate::store::CsvStore;

pub fn cmd_init(config: &Config) -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Created config.toml - edit it before starting the service.");
    } else {
        println!("Config file already exists, leaving it untouched.");
    }

    let store = CsvStore::new(&config.storage.table_path);
    if store.ensure_table()? {
        println!("✓ Created record table: {}", store.path().display());
    } else {
        println!("Record table already exists: {}", store.path().display());
    }

    println!();
    println!("Next: kartoteka create-admin --email ... to add the first admin.");

    Ok(())
}

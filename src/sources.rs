use anyhow::Result;

use crate::config::Config;
use crate::fetch::candidates;
use crate::models::Variant;

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<48} {:<18} CANDIDATES", "SOURCE", "VARIANTS");

    for source in &config.sources {
        let list = candidates(source, &config.fetch);
        let variants = if list.iter().any(|c| c.variant == Variant::Localized) {
            "primary+localized"
        } else {
            "primary"
        };
        let locations: Vec<String> = list.iter().map(|c| c.location()).collect();
        println!(
            "{:<48} {:<18} {}",
            source.id().to_string(),
            variants,
            locations.join(", ")
        );
    }

    Ok(())
}

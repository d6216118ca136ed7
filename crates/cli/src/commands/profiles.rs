//! `evoweb profiles` — List the profile catalog and interest rules.

use evoweb_profile::{InterestTaxonomy, StaticCatalog};

pub fn run() {
    let catalog = StaticCatalog::builtin();
    let taxonomy = InterestTaxonomy::builtin();

    println!("Profiles (rotation order)");
    println!("=========================");
    for (i, profile) in catalog.profiles().iter().enumerate() {
        let prefs = &profile.content_preferences;
        println!("  {}. {}", i + 1, profile.id);
        println!("     primary:  {}", profile.primary_interest);
        println!("     others:   {}", profile.other_interests.join(", "));
        println!(
            "     content:  {} reading, {} length, {}",
            prefs.reading_level, prefs.length, prefs.media_preference
        );
    }

    println!("\nInterest rules (signal key contains keyword)");
    println!("============================================");
    for rule in taxonomy.rules() {
        println!("  {:<12} ← {}", rule.label, rule.keywords.join(", "));
    }
}

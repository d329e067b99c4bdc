//! # Seed Data Generator
//!
//! Populates a development database with the default card categories and,
//! optionally, demo listings so the storefront has something to show before
//! the first eBay sync.
//!
//! ## Usage
//! ```bash
//! # Default categories only
//! cargo run -p cardshop-db --bin seed
//!
//! # Plus 40 demo listings
//! cargo run -p cardshop-db --bin seed -- --demo 40
//!
//! # Specify database path
//! cargo run -p cardshop-db --bin seed -- --db ./data/cardshop.db
//! ```
//!
//! Demo listings use item ids starting at 900000000000 so they never collide
//! with real eBay ids; the first real sync removes them (they carry no user
//! metadata and eBay reports them as not found).

use cardshop_core::FetchedListing;
use cardshop_db::{Database, DbConfig};
use chrono::Utc;
use std::env;

/// Default categories with descriptions.
const CATEGORIES: &[(&str, &str)] = &[
    ("Pokemon", "Pokemon TCG singles"),
    ("Magic: The Gathering", "MTG singles and foils"),
    ("Yu-Gi-Oh!", "Yu-Gi-Oh! singles"),
    ("Sports Cards", "Baseball, basketball, football, hockey"),
    ("Graded Cards", "PSA, BGS and CGC slabs"),
    ("Sealed Product", "Booster boxes, packs and tins"),
];

/// Card names used for demo listings.
const DEMO_CARDS: &[&str] = &[
    "Charizard Base Set Holo",
    "Pikachu Illustrator Promo",
    "Black Lotus Unlimited",
    "Blue-Eyes White Dragon LOB 1st Edition",
    "Mickey Mantle 1952 Topps",
    "Umbreon VMAX Alt Art",
    "Mox Sapphire Revised",
    "Dark Magician Girl MFC",
];

const DEMO_ITEM_ID_BASE: u64 = 900_000_000_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut demo: usize = 0;
    let mut db_path = String::from("./cardshop_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--demo" | "-n" => {
                if i + 1 < args.len() {
                    demo = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Card Shop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --demo <N>     Also insert N demo listings (default: 0)");
                println!("  -d, --db <PATH>    Database file path (default: ./cardshop_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Card Shop Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut created = 0;
    for (name, description) in CATEGORIES {
        if db.categories().ensure(name, Some(description)).await? {
            created += 1;
        }
    }
    println!("✓ Categories: {} created, {} already present", created, CATEGORIES.len() - created);

    if demo > 0 {
        let existing = db.listings().count().await?;
        if existing > 0 {
            println!("⚠ Database already has {} listings", existing);
            println!("  Skipping demo listings.");
            return Ok(());
        }

        let now = Utc::now();
        let mut inserted = 0;
        for n in 0..demo {
            let listing = demo_listing(n);
            if let Err(e) = db.listings().insert(&listing, now).await {
                eprintln!("Failed to insert {}: {}", listing.sku(), e);
                continue;
            }
            inserted += 1;
        }
        println!("✓ Inserted {} demo listings", inserted);
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

/// Generates one deterministic demo listing.
fn demo_listing(n: usize) -> FetchedListing {
    let item_id = (DEMO_ITEM_ID_BASE + n as u64).to_string();
    let card = DEMO_CARDS[n % DEMO_CARDS.len()];

    // $4.99 - $249.99
    let price_cents = 499 + ((n * 1_733) % 24_500) as i64;

    FetchedListing {
        title: format!("{} #{}", card, n + 1),
        description: format!("Demo listing for {}", card),
        price_cents,
        currency: "USD".to_string(),
        quantity: 1 + (n % 3) as i64,
        image_url: String::new(),
        listing_url: format!("https://www.ebay.com/itm/{}", item_id),
        seller_id: "demo-seller".to_string(),
        item_id,
    }
}

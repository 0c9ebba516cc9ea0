//! # Seed Data Generator
//!
//! Creates a demo audit session for development.
//!
//! ## Usage
//! ```bash
//! # Branch 12, 8 products per category (default)
//! cargo run -p recount-db --bin seed
//!
//! # Another branch, bigger categories
//! cargo run -p recount-db --bin seed -- --branch 3 --per-category 40
//!
//! # Specify database path
//! cargo run -p recount-db --bin seed -- --db ./data/recount.db
//! ```
//!
//! ## Generated Tree
//! Two groups (Medicines, Perfumery), each with departments and categories
//! taken from the table below. Products get deterministic EAN-like codes,
//! quantities 0-47 and unit costs 1.50-40.00.
//!
//! If the branch already has an open session the seed refuses to run; a
//! completed one makes the new session take the next audit number.

use chrono::{Datelike, Utc};
use std::env;

use recount_core::{
    inventory_number, next_audit_number, validate_snapshot, AuditSnapshot, AuditStatus, Category, Department, Group,
    Money, Product, SessionStatus,
};
use recount_db::{Database, DbConfig};

/// (group id, group name, [(department id, department name, [category names])])
const TREE: &[(&str, &str, &[(&str, &str, &[&str])])] = &[
    (
        "1",
        "Medicines",
        &[
            ("10", "Pain relief", &["Analgesics", "Anti-inflammatories", "Muscle relaxants"]),
            ("11", "Vitamins", &["Multivitamins", "Vitamin C", "Minerals"]),
            ("12", "Respiratory", &["Cough syrups", "Nasal sprays"]),
        ],
    ),
    (
        "2",
        "Perfumery",
        &[
            ("20", "Skin care", &["Sunscreens", "Moisturizers"]),
            ("21", "Hair care", &["Shampoos", "Conditioners", "Dyes"]),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_category: usize = 8;
    let mut db_path = String::from("./recount_dev.db");
    let mut branch = String::from("12");
    let mut company = String::from("Drogaria Exemplo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--per-category" | "-p" => {
                if i + 1 < args.len() {
                    per_category = args[i + 1].parse().unwrap_or(8);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--branch" | "-b" => {
                if i + 1 < args.len() {
                    branch = args[i + 1].clone();
                    i += 1;
                }
            }
            "--company" => {
                if i + 1 < args.len() {
                    company = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Recount Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --per-category <N>  Products per category (default: 8)");
                println!("  -b, --branch <CODE>     Branch code (default: 12)");
                println!("      --company <NAME>    Company name");
                println!("  -d, --db <PATH>         Database file path (default: ./recount_dev.db)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Recount Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Branch:   {}", branch);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let latest = db.sessions().latest_number(&branch).await?;
    if let Some((number, SessionStatus::Open)) = latest {
        println!("⚠ Branch {} already has open audit #{}", branch, number);
        println!("  Finish it or delete the database file to regenerate.");
        return Ok(());
    }
    let audit_number = next_audit_number(latest);

    let mut snapshot = build_snapshot(per_category);
    snapshot.company = company;
    snapshot.branch = branch.clone();
    snapshot.inventory_number = inventory_number(Utc::now().year(), &branch, audit_number);
    validate_snapshot(&snapshot)?;

    let session = db.sessions().create(&branch, audit_number, snapshot).await?;

    let products: usize = session.snapshot.categories().map(|sc| sc.category.items_count).sum();
    println!();
    println!("✓ Created audit #{} ({})", audit_number, session.snapshot.inventory_number);
    println!("  Session id: {}", session.id);
    println!("  Categories: {}", session.snapshot.categories().count());
    println!("  Products:   {}", products);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn build_snapshot(per_category: usize) -> AuditSnapshot {
    let mut seed = 0usize;
    let groups = TREE
        .iter()
        .map(|(group_id, group_name, departments)| Group {
            id: group_id.to_string(),
            name: group_name.to_string(),
            departments: departments
                .iter()
                .map(|(dept_id, dept_name, categories)| Department {
                    id: dept_id.to_string(),
                    numeric_id: Some(dept_id.to_string()),
                    name: dept_name.to_string(),
                    categories: categories
                        .iter()
                        .enumerate()
                        .map(|(idx, cat_name)| {
                            let cat_id = format!("{}{:02}", dept_id, idx);
                            let products = (0..per_category)
                                .map(|n| {
                                    seed += 1;
                                    generate_product(cat_name, n, seed)
                                })
                                .collect();
                            let mut category = Category {
                                numeric_id: Some(cat_id.clone()),
                                id: cat_id,
                                name: cat_name.to_string(),
                                items_count: 0,
                                total_quantity: 0,
                                total_cost: Money::zero(),
                                status: AuditStatus::Pending,
                                products,
                            };
                            category.recompute_totals();
                            category
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    AuditSnapshot {
        groups,
        ..AuditSnapshot::default()
    }
}

/// One product with deterministic pseudo-random figures.
fn generate_product(category: &str, index: usize, seed: usize) -> Product {
    // EAN-13 shaped, checksum not valid
    let code = format!("789{:010}", seed * 7919 % 10_000_000_000);

    Product {
        reduced_code: Some(format!("{:06}", seed)),
        name: format!("{} #{}", category, index + 1),
        quantity: ((seed * 31) % 48) as i64,
        unit_cost: Money::from_cents(150 + ((seed * 173) % 3851) as i64),
        code,
    }
}

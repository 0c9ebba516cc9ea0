//! Shared fixtures for unit tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::money::Money;
use crate::types::{AuditSnapshot, AuditStatus, Category, Department, Group, Product};

/// 2026-10-16 at `hour:minute` UTC.
pub fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub fn product(code: &str, quantity: i64, unit_cost: i64) -> Product {
    Product {
        code: code.to_string(),
        reduced_code: None,
        name: format!("Product {code}"),
        quantity,
        unit_cost: Money::from_cents(unit_cost),
    }
}

pub fn category(id: &str, products: Vec<Product>) -> Category {
    let mut category = Category {
        id: id.to_string(),
        numeric_id: Some(id.to_string()),
        name: format!("Category {id}"),
        items_count: 0,
        total_quantity: 0,
        total_cost: Money::zero(),
        status: AuditStatus::Pending,
        products,
    };
    category.recompute_totals();
    category
}

/// ```text
/// 1 ─┬─ 10 ─┬─ 100  (00789: 10 × 1.00, 1001: 5 × 2.00)
///    │      └─ 101  (1002: 4 × 0.50)
///    └─ 11 ─── 110  (2001: 2 × 10.00, 2002: 0 × 3.00)
/// 2 ─── 20 ─── 200  (3001: 7 × 1.00)
/// ```
pub fn sample_snapshot() -> AuditSnapshot {
    AuditSnapshot {
        groups: vec![
            Group {
                id: "1".to_string(),
                name: "Medicines".to_string(),
                departments: vec![
                    Department {
                        id: "10".to_string(),
                        numeric_id: Some("10".into()),
                        name: "Pain relief".to_string(),
                        categories: vec![
                            category("100", vec![product("00789", 10, 100), product("1001", 5, 200)]),
                            category("101", vec![product("1002", 4, 50)]),
                        ],
                    },
                    Department {
                        id: "11".to_string(),
                        numeric_id: Some("11".into()),
                        name: "Vitamins".to_string(),
                        categories: vec![category(
                            "110",
                            vec![product("2001", 2, 1000), product("2002", 0, 300)],
                        )],
                    },
                ],
            },
            Group {
                id: "2".to_string(),
                name: "Cosmetics".to_string(),
                departments: vec![Department {
                    id: "20".to_string(),
                    numeric_id: Some("20".into()),
                    name: "Skin care".to_string(),
                    categories: vec![category("200", vec![product("3001", 7, 100)])],
                }],
            },
        ],
        company: "Drogaria Exemplo".to_string(),
        branch: "12".to_string(),
        inventory_number: "2026-0012-0001".to_string(),
        ..AuditSnapshot::default()
    }
}

//! Product catalog: the fixed built-in list unioned with whatever the
//! catalog collaborator serves.

use crate::model::Product;

/// The built-in products every terminal carries regardless of what the
/// remote catalog holds. Ids are stable.
pub fn builtin_products() -> Vec<Product> {
    vec![
        Product::new("1", "Curriculo", "Trabalho", 15.0),
        Product::new("2", "Curriculo PDF", "Trabalho", 5.0),
        Product::new("3", "Xerox", "Impressão", 1.0),
        Product::new("4", "Imp Curriculo 1f", "Impressão", 3.0),
        Product::new("5", "Imp Curriculo 2f", "Impressão", 4.0),
        Product::new("6", "Musica Selecionar", "Musica", 2.0),
        Product::new("7", "Detran", "Veiculo", 10.0),
    ]
}

/// Union the built-in list with remotely listed products, de-duplicated by
/// id and then by name. Built-in entries win on conflict.
pub fn merge_products(remote: &[Product]) -> Vec<Product> {
    let mut merged = builtin_products();
    for product in remote {
        let duplicate = merged
            .iter()
            .any(|existing| existing.id == product.id || existing.name == product.name);
        if !duplicate {
            merged.push(product.clone());
        }
    }
    merged
}

/// Unique category names in first-seen order.
pub fn categories(products: &[Product]) -> Vec<String> {
    let mut seen = Vec::new();
    for product in products {
        if !seen.contains(&product.category) {
            seen.push(product.category.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_entries_win_on_id_conflict() {
        let remote = vec![
            Product::new("3", "Xerox Premium", "Impressão", 2.0),
            Product::new("90", "Plastificação", "Impressão", 6.0),
        ];
        let merged = merge_products(&remote);
        let xerox = merged.iter().find(|p| p.id == "3").unwrap();
        assert_eq!(xerox.name, "Xerox");
        assert_eq!(xerox.price, 1.0);
        assert!(merged.iter().any(|p| p.id == "90"));
    }

    #[test]
    fn name_conflicts_are_also_deduplicated() {
        let remote = vec![Product::new("99", "Detran", "Veiculo", 12.0)];
        let merged = merge_products(&remote);
        assert_eq!(merged.iter().filter(|p| p.name == "Detran").count(), 1);
        assert_eq!(merged.iter().find(|p| p.name == "Detran").unwrap().id, "7");
    }

    #[test]
    fn categories_preserve_first_seen_order() {
        let cats = categories(&builtin_products());
        assert_eq!(cats, vec!["Trabalho", "Impressão", "Musica", "Veiculo"]);
    }
}

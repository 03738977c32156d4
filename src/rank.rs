// src/rank.rs
//
// Headline-figure selection: the strictly greatest positive quote. Ties go
// to the earliest source in registration order, so the answer is stable for
// a given quote list.

use crate::quote::ShopQuote;

/// `None` means "no source had a legible price". Not an error and not a
/// zero quote.
pub fn best_quote(quotes: &[ShopQuote]) -> Option<&ShopQuote> {
    let mut best: Option<&ShopQuote> = None;
    for q in quotes {
        if q.price == 0 {
            continue;
        }
        match best {
            Some(b) if q.price <= b.price => {}
            _ => best = Some(q),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str, price: u32) -> ShopQuote {
        ShopQuote {
            shop_name: name.to_string(),
            price,
            url: format!("https://{name}.test/"),
            product_name: None,
            image_url: None,
        }
    }

    #[test]
    fn picks_strictly_greatest_price() {
        let quotes = vec![q("A", 300), q("B", 900), q("C", 500)];
        assert_eq!(best_quote(&quotes).unwrap().shop_name, "B");
    }

    #[test]
    fn tie_breaks_to_first_occurrence() {
        let quotes = vec![q("A", 0), q("B", 500), q("C", 1500), q("D", 1500)];
        assert_eq!(best_quote(&quotes).unwrap().shop_name, "C");
    }

    #[test]
    fn all_zero_yields_absent() {
        let quotes = vec![q("A", 0), q("B", 0)];
        assert!(best_quote(&quotes).is_none());
    }

    #[test]
    fn empty_list_yields_absent() {
        assert!(best_quote(&[]).is_none());
    }
}

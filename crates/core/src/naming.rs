//! Identifier sanitizing and quoting for generated SQL.
//!
//! Legacy object names can contain spaces, punctuation, and mixed case.
//! Everything that ends up in an identifier position goes through
//! [`sanitize_identifier`] first and [`quote_ident`] at emission time.

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Normalize a free-form legacy name into a safe target identifier.
///
/// Lowercases, replaces each run of whitespace with a single underscore,
/// drops every character outside `[a-z0-9_]`, and truncates to
/// [`MAX_IDENTIFIER_LENGTH`]. The result may be empty.
///
/// # Examples
///
/// ```
/// use accessmig_core::naming::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("Order Details"), "order_details");
/// assert_eq!(sanitize_identifier("Unit Price ($)"), "unit_price_");
/// assert_eq!(sanitize_identifier("order_details"), "order_details");
/// ```
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        for lower in ch.to_lowercase() {
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '_' {
                out.push(lower);
            }
        }
    }

    // Output is pure ASCII, so byte truncation is char-safe.
    out.truncate(MAX_IDENTIFIER_LENGTH);
    out
}

/// Wrap an identifier in double quotes, doubling any embedded quote.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema-qualified, quoted relation name: `"schema"."name"`.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Quote a string literal, doubling any embedded single quote.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name for a secondary index, prefixed with its owning table so that
/// identically named legacy indexes on different tables cannot collide.
pub fn index_name(table: &str, index: &str) -> String {
    sanitize_identifier(&format!("{table}_{index}"))
}

/// Name PostgreSQL gives the primary key index of `table`.
pub fn primary_key_name(table: &str) -> String {
    let keep = (MAX_IDENTIFIER_LENGTH - "_pkey".len()).min(table.len());
    format!("{}_pkey", &table[..keep])
}

/// `{base}_{n}`, shortening `base` so the result fits in
/// [`MAX_IDENTIFIER_LENGTH`]. `base` must be ASCII.
pub fn with_suffix(base: &str, n: usize) -> String {
    let suffix = format!("_{n}");
    let keep = MAX_IDENTIFIER_LENGTH.saturating_sub(suffix.len()).min(base.len());
    format!("{}{suffix}", &base[..keep])
}

/// Assign unique target names to a list of already-sanitized names.
///
/// Empty names become `column_{n}` (1-based position). Repeats receive
/// `_2`, `_3`, ... in order of appearance, and every result stays within
/// [`MAX_IDENTIFIER_LENGTH`].
pub fn dedupe_identifiers(names: &[String]) -> Vec<String> {
    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for (i, name) in names.iter().enumerate() {
        let base = if name.is_empty() {
            format!("column_{}", i + 1)
        } else {
            name.clone()
        };

        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = with_suffix(&base, n);
            n += 1;
        }

        taken.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    #[test]
    fn lowercases_and_joins_whitespace() {
        assert_eq!(sanitize_identifier("Customer  Name"), "customer_name");
        assert_eq!(sanitize_identifier("\tTab\nNew Line "), "_tab_new_line_");
    }

    #[test]
    fn strips_punctuation_and_accents() {
        assert_eq!(sanitize_identifier("Prix-€/Unité"), "prixunit");
        assert_eq!(sanitize_identifier("a\"; DROP TABLE x; --"), "a_drop_table_x_");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Order Details",
            "  leading",
            "ÄÖÜ mixed 123",
            "already_clean",
            "",
            "\"quoted\"",
            &"Very Long Name ".repeat(10),
        ];
        for input in inputs {
            let once = sanitize_identifier(input);
            assert_eq!(sanitize_identifier(&once), once, "input: {input:?}");
            assert!(is_safe(&once), "unsafe output {once:?}");
        }
    }

    #[test]
    fn truncates_to_postgres_limit() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_identifier(&long).len(), MAX_IDENTIFIER_LENGTH);
    }

    #[test]
    fn quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn qualified_name_quotes_both_parts() {
        assert_eq!(qualified_name("app", "orders"), "\"app\".\"orders\"");
    }

    #[test]
    fn index_name_is_prefixed_with_table() {
        assert_eq!(index_name("customers", "idx1"), "customers_idx1");
        assert_eq!(index_name("orders", "Order Date"), "orders_order_date");
    }

    #[test]
    fn primary_key_name_fits_the_limit() {
        assert_eq!(primary_key_name("customers"), "customers_pkey");
        let long = primary_key_name(&"t".repeat(MAX_IDENTIFIER_LENGTH));
        assert_eq!(long.len(), MAX_IDENTIFIER_LENGTH);
        assert!(long.ends_with("_pkey"));
    }

    #[test]
    fn dedupe_assigns_suffixes_and_fallbacks() {
        let names = vec![
            "name".to_string(),
            String::new(),
            "name".to_string(),
            "name".to_string(),
        ];
        assert_eq!(
            dedupe_identifiers(&names),
            vec!["name", "column_2", "name_2", "name_3"]
        );
    }

    #[test]
    fn dedupe_respects_length_limit() {
        let base = "y".repeat(MAX_IDENTIFIER_LENGTH);
        let deduped = dedupe_identifiers(&[base.clone(), base]);
        assert_eq!(deduped[1].len(), MAX_IDENTIFIER_LENGTH);
        assert!(deduped[1].ends_with("_2"));
        assert_ne!(deduped[0], deduped[1]);
    }
}

//! Parsing of user-supplied Workshop ID lists.

use thiserror::Error;

use super::types::ItemId;

/// Rejection reasons for a raw ID list. Any of these rejects the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdFormatError {
    #[error("No Workshop IDs given")]
    Empty,

    #[error("'{0}' is not a Workshop ID: expected digits only")]
    NotDigits(String),

    #[error("'{0}' is not a valid Workshop ID: must be between 1 and 18446744073709551615")]
    OutOfRange(String),
}

/// Parse a whitespace-separated list of Workshop IDs.
///
/// Every token must be one or more ASCII digits naming a positive ID that
/// fits in a `u64`. Repeated IDs collapse to their first occurrence.
pub fn parse_id_list(raw: &str) -> Result<Vec<ItemId>, IdFormatError> {
    let mut ids: Vec<ItemId> = Vec::new();

    for token in raw.split_ascii_whitespace() {
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdFormatError::NotDigits(token.to_string()));
        }
        let id = token
            .parse::<u64>()
            .ok()
            .and_then(ItemId::new)
            .ok_or_else(|| IdFormatError::OutOfRange(token.to_string()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err(IdFormatError::Empty);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::id;

    #[test]
    fn test_single_id() {
        assert_eq!(parse_id_list("2503622437").unwrap(), vec![id(2503622437)]);
    }

    #[test]
    fn test_space_separated_ids() {
        assert_eq!(
            parse_id_list("  12  3\t456 ").unwrap(),
            vec![id(12), id(3), id(456)]
        );
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(parse_id_list("7 8 7").unwrap(), vec![id(7), id(8)]);
    }

    #[test]
    fn test_mixed_token_rejects_batch() {
        assert_eq!(
            parse_id_list("12 3x"),
            Err(IdFormatError::NotDigits("3x".to_string()))
        );
    }

    #[test]
    fn test_signs_and_separators_rejected() {
        assert!(matches!(parse_id_list("-5"), Err(IdFormatError::NotDigits(_))));
        assert!(matches!(parse_id_list("+5"), Err(IdFormatError::NotDigits(_))));
        assert!(matches!(parse_id_list("1,2"), Err(IdFormatError::NotDigits(_))));
        assert!(matches!(parse_id_list("１２"), Err(IdFormatError::NotDigits(_))));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(parse_id_list(""), Err(IdFormatError::Empty));
        assert_eq!(parse_id_list("   "), Err(IdFormatError::Empty));
    }

    #[test]
    fn test_zero_and_overflow_rejected() {
        assert_eq!(
            parse_id_list("0"),
            Err(IdFormatError::OutOfRange("0".to_string()))
        );
        assert!(matches!(
            parse_id_list("99999999999999999999"),
            Err(IdFormatError::OutOfRange(_))
        ));
    }
}

//! Data source trait for batched dictionary fetches.
//!
//! The engine never talks to a database or remote service itself. Hosts
//! implement [`TranslationDataSource`] for whatever backs their dictionaries
//! and hand it to the [`TranslationContextBuilder`](crate::TranslationContextBuilder).
//!
//! # Example: an in-memory data source
//!
//! ```rust
//! use dict_trans::{CodeName, TranslationDataSource, TranslationResult};
//!
//! struct StaticDicts;
//!
//! impl TranslationDataSource for StaticDicts {
//!     fn translate_dict_batch_code2name(
//!         &self,
//!         dict_code: &str,
//!         codes: &str,
//!     ) -> TranslationResult<Vec<CodeName>> {
//!         let all = match dict_code {
//!             "user_status" => vec![CodeName::new("1", "Active"), CodeName::new("0", "Inactive")],
//!             _ => Vec::new(),
//!         };
//!         Ok(all
//!             .into_iter()
//!             .filter(|entry| codes == "%" || codes.split(',').any(|c| c == entry.code))
//!             .collect())
//!     }
//!
//!     fn translate_table_dict_batch_code2name(
//!         &self,
//!         _table: &str,
//!         _code_column: &str,
//!         _name_column: &str,
//!         _codes: &str,
//!         _condition: Option<&str>,
//!     ) -> TranslationResult<Vec<CodeName>> {
//!         Ok(Vec::new())
//!     }
//! }
//! ```

use crate::error::TranslationResult;

/// Codes argument meaning "every code of the dictionary".
pub const ALL_CODES: &str = "%";

/// One code/name pair returned by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeName {
    /// Stored code.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl CodeName {
    /// Creates a code/name pair.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Backend able to resolve many codes of one dictionary in a single call.
///
/// `codes` is a comma-joined list of stringified codes, or [`ALL_CODES`] when
/// the caller wants the whole dictionary. Implementations may return pairs for
/// codes that were not asked for; extra pairs are kept.
///
/// Errors are not fatal: the builder degrades the failing request to an empty
/// dictionary and keeps going.
pub trait TranslationDataSource: Send + Sync {
    /// Resolves codes of a system dictionary.
    fn translate_dict_batch_code2name(
        &self,
        dict_code: &str,
        codes: &str,
    ) -> TranslationResult<Vec<CodeName>>;

    /// Resolves codes of a table dictionary.
    ///
    /// `condition` is an opaque row filter forwarded from the metadata.
    fn translate_table_dict_batch_code2name(
        &self,
        table: &str,
        code_column: &str,
        name_column: &str,
        codes: &str,
        condition: Option<&str>,
    ) -> TranslationResult<Vec<CodeName>>;
}

impl<T: TranslationDataSource + ?Sized> TranslationDataSource for std::sync::Arc<T> {
    fn translate_dict_batch_code2name(
        &self,
        dict_code: &str,
        codes: &str,
    ) -> TranslationResult<Vec<CodeName>> {
        (**self).translate_dict_batch_code2name(dict_code, codes)
    }

    fn translate_table_dict_batch_code2name(
        &self,
        table: &str,
        code_column: &str,
        name_column: &str,
        codes: &str,
        condition: Option<&str>,
    ) -> TranslationResult<Vec<CodeName>> {
        (**self).translate_table_dict_batch_code2name(
            table,
            code_column,
            name_column,
            codes,
            condition,
        )
    }
}

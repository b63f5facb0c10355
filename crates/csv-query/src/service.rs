use std::path::Path;

use csv_query_table::Table;

use crate::encoding::TextEncoding;
use crate::error::Error;
use crate::options::{EncodingOption, ParseOptions};
use crate::reader::{CsvReader, ReadError, TableReader};
use crate::sanitize;
use crate::sql::{QueryEngine, SqliteEngine};

/// Name the loaded table is bound to inside queries.
pub const DATAFRAME_BINDING: &str = "df";

/// Read → (optional) query → (optional) formula escaping.
///
/// The service is stateless; every call opens its own file and builds its own tables, so a
/// shared instance can serve concurrent callers when the collaborators allow it.
#[derive(Clone, Debug, Default)]
pub struct CsvQueryService<R = CsvReader, Q = SqliteEngine> {
    reader: R,
    engine: Q,
}

impl CsvQueryService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: TableReader, Q: QueryEngine> CsvQueryService<R, Q> {
    pub fn with_collaborators(reader: R, engine: Q) -> Self {
        Self { reader, engine }
    }

    pub fn query_csv(
        &self,
        input_file_path: &Path,
        parse_options: &ParseOptions,
        sql_query: Option<&str>,
        escape_formulas: bool,
    ) -> Result<Table, Error> {
        let options = ParseOptions::service_defaults().merge(parse_options.clone());

        let mut table = self.read_table(input_file_path, &options)?;

        if let Some(query) = sql_query {
            log::debug!("running query against {DATAFRAME_BINDING}: {query}");
            table = self
                .engine
                .execute(query, &[(DATAFRAME_BINDING, &table)])?;
        }

        if escape_formulas {
            table = sanitize::escape_formulas(table);
        }

        Ok(table)
    }

    /// One parse attempt, or for `encoding = "auto"` a UTF-8 attempt followed by exactly one
    /// Latin-1 attempt when (and only when) the first fails to decode.
    fn read_table(&self, path: &Path, options: &ParseOptions) -> Result<Table, ReadError> {
        if options.encoding != Some(EncodingOption::Auto) {
            return self.reader.parse(path, options);
        }

        let utf8 = options.with_encoding(EncodingOption::named(TextEncoding::UTF8_LABEL));
        match self.reader.parse(path, &utf8) {
            Err(err) if err.is_decode() => {
                log::debug!(
                    "{} is not valid UTF-8 ({err}); reading as Latin-1",
                    path.display()
                );
                let latin1 =
                    options.with_encoding(EncodingOption::named(TextEncoding::LATIN1_LABEL));
                self.reader.parse(path, &latin1)
            }
            other => other,
        }
    }
}

/// [`CsvQueryService::query_csv`] with the default reader and query engine.
pub fn query_csv(
    input_file_path: impl AsRef<Path>,
    parse_options: &ParseOptions,
    sql_query: Option<&str>,
    escape_formulas: bool,
) -> Result<Table, Error> {
    CsvQueryService::new().query_csv(
        input_file_path.as_ref(),
        parse_options,
        sql_query,
        escape_formulas,
    )
}

use std::borrow::Cow;

#[apex_derive::apex_error]
pub enum CatalogError {
    #[error("Unknown domain{}: {message}", format_context(.context))]
    UnknownDomain { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Parse error{}: {source}", format_context(.context))]
    Parse { source: std::num::ParseIntError, context: Option<Cow<'static, str>> },
}

fn parse_level(raw: &str) -> Result<u8, CatalogError> {
    Ok(raw.parse::<u8>().context("parsing tier level")?)
}

fn main() {
    let _ = parse_level("3");
    let err = CatalogError::UnknownDomain { message: "Rust".into(), context: None };
    assert_eq!(err.code(), "unknown_domain");
}

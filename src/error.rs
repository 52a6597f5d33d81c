use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpubmarkError {
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    #[error("no chapters found: {0}")]
    NoChaptersFound(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EpubmarkError>;

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("unable to load repository configuration")]
    Config,
    #[display("repository operation failed")]
    Transfer,
    #[display("unable to read from the virtual tree")]
    Tree,
    #[display("no such file or directory `{_0}`")]
    NotFound(#[error(not(source))] String),
    #[display("local I/O failed")]
    Io,
}

pub mod check;
pub mod edit;
pub mod export;
pub mod import;
pub mod info;
pub mod init;
pub mod probe;

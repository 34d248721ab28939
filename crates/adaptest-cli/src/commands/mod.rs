pub mod compare;
pub mod estimate;
pub mod info;
pub mod init;
pub mod simulate;
pub mod take;
pub mod validate;

pub mod declare;
pub mod init_db;
pub mod reset_db;
pub mod verify;

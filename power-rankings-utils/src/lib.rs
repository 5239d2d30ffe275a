pub mod credentials;
pub mod fs_json_util;
#[macro_use]
pub mod macros;

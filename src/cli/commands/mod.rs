pub mod gen_key;
pub mod serve;

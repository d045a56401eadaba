pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 5000;
pub(crate) const NODE_ID_BYTES: usize = 16;

// gitgate-common: wire-level types shared by the gateway and its callers

pub mod envelope;
pub mod record;

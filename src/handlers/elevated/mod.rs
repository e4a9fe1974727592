// handlers/elevated/mod.rs - Master-admin endpoints
//
// Same middleware stack as the protected tier; each handler additionally
// requires the master flag and answers 403 without it.

pub mod users;

/// Object storage client (Supabase Storage).
pub mod object;
/// Local and durable artifact sinks.
pub mod sink;

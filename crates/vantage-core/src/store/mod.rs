// ── Object storage ──

mod collection;

pub(crate) use collection::ObjectCollection;

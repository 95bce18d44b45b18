mod anime;
pub(crate) mod raw;

pub use anime::{AnimeKind, AnimeStatus, CatalogEntry, Genre, ImageSet, Screenshot, Studio};
pub(crate) use anime::parse_score;

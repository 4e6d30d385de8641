// Job ingestion pipeline: scrape a paginated results listing, normalize each
// card into an ExtractedListing, then record one application row per listing.
// The browser session is the only exclusively owned resource and is closed on
// every exit path (see extractor::run_extraction).

pub mod extractor;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod parser;
pub mod recorder;
pub mod source;
pub mod wait;

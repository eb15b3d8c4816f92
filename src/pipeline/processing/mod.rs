// Pipeline processing: date parsing, merging, bucketing, and digest assembly

pub mod dates;
pub mod digest;
pub mod key;
pub mod merge;
pub mod windows;

pub use dates::{DateExpression, DateExpressionParser, ParseError, ParserConfig};
pub use digest::{Digest, DigestBuilder, DigestEntry, DigestSection, InstantFormat};
pub use key::{EventKeyBuilder, KeyStrategy};
pub use merge::{EventMerger, MergeReport};
pub use windows::{ClassifiedEvents, TimeWindowClassifier, WeekBounds};

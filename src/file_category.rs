/// File categorization by extension.
///
/// This module maps file extensions to the fixed set of categories files are
/// sorted into (e.g. "Audio", "Docs"). Anything the table does not know falls
/// into [`Category::Unknown`]. Classification is pure; recording which
/// extensions were seen is done separately through [`Discovery`].
///
/// # Examples
///
/// ```
/// use foldersort::file_category::{Category, CategoryTable};
///
/// let table = CategoryTable::default();
/// assert_eq!(table.classify(".MP3"), Category::Audio);
/// assert_eq!(table.classify(".pdf"), Category::Docs);
/// assert_eq!(table.classify(".xyz"), Category::Unknown);
/// ```
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// A category files are sorted into.
///
/// The directory created for a category is named exactly like the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Audio files (MP3, WAV, FLAC, WMA)
    Audio,
    /// Document files (DOCX, TXT, PDF)
    Docs,
    /// Image files (JPEG, PNG, JPG, SVG)
    Images,
    /// Archive files (ZIP, GZ, TZR)
    Archives,
    /// Video files (AVI, MP4, MOV, MKV)
    Video,
    /// Everything the table does not match
    Unknown,
}

impl Category {
    /// All categories, in table order.
    pub const ALL: [Category; 6] = [
        Category::Audio,
        Category::Docs,
        Category::Images,
        Category::Archives,
        Category::Video,
        Category::Unknown,
    ];

    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use foldersort::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "Images");
    /// assert_eq!(Category::Unknown.dir_name(), "Unknown");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Audio => "Audio",
            Category::Docs => "Docs",
            Category::Images => "Images",
            Category::Archives => "Archives",
            Category::Video => "Video",
            Category::Unknown => "Unknown",
        }
    }

    /// Returns true if `name` is the directory name of some category.
    pub fn is_category_dir_name(name: &str) -> bool {
        Self::ALL.iter().any(|c| c.dir_name() == name)
    }
}

/// Extensions per category, in matching order. `Unknown` has none.
const STANDARD_TABLE: &[(Category, &[&str])] = &[
    (Category::Audio, &[".mp3", ".wav", ".flac", ".wma"]),
    (Category::Docs, &[".docx", ".txt", ".pdf"]),
    (Category::Images, &[".jpeg", ".png", ".jpg", ".svg"]),
    (Category::Archives, &[".zip", ".gz", ".tzr"]),
    (Category::Video, &[".avi", ".mp4", ".mov", ".mkv"]),
];

/// Immutable mapping from lowercase extension (with leading dot) to category.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    extension_map: HashMap<String, Category>,
}

impl CategoryTable {
    /// Creates the table with the standard mappings.
    pub fn new() -> Self {
        let mut extension_map = HashMap::new();
        for (category, extensions) in STANDARD_TABLE {
            for ext in *extensions {
                // first category listing an extension wins
                extension_map.entry(ext.to_string()).or_insert(*category);
            }
        }
        Self { extension_map }
    }

    /// Maps an extension to its category, case-insensitively.
    ///
    /// The leading dot is optional. Unmatched extensions (including the empty
    /// one) map to [`Category::Unknown`].
    ///
    /// # Examples
    ///
    /// ```
    /// use foldersort::file_category::{Category, CategoryTable};
    ///
    /// let table = CategoryTable::default();
    /// assert_eq!(table.classify("ZIP"), Category::Archives);
    /// assert_eq!(table.classify(""), Category::Unknown);
    /// ```
    pub fn classify(&self, extension: &str) -> Category {
        let key = dotted_lowercase(extension);
        self.extension_map
            .get(&key)
            .copied()
            .unwrap_or(Category::Unknown)
    }

    /// Returns true if the table has an explicit entry for this extension.
    pub fn is_known(&self, extension: &str) -> bool {
        self.classify(extension) != Category::Unknown
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the lowercased extension of `path` with its leading dot, or an
/// empty string when the file name has no extension. A trailing dot
/// (`name.`) is not an extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn dotted_lowercase(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.is_empty() || lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Extensions seen during a run, split by whether they matched a category.
///
/// Both sets only grow. Directory tasks fill a local `Discovery` and merge it
/// into the shared one when they finish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovery {
    /// Extensions that matched an explicit category.
    pub known: BTreeSet<String>,
    /// Extensions that fell into `Unknown`.
    pub unknown: BTreeSet<String>,
}

impl Discovery {
    /// Creates empty discovery sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an extension under the set matching its category.
    pub fn record(&mut self, extension: &str, category: Category) {
        let key = dotted_lowercase(extension);
        if category == Category::Unknown {
            self.unknown.insert(key);
        } else {
            self.known.insert(key);
        }
    }

    /// Moves every extension of `other` into `self`.
    pub fn merge(&mut self, other: Discovery) {
        self.known.extend(other.known);
        self.unknown.extend(other.unknown);
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }
}

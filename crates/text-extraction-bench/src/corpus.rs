//! Test document corpus
//!
//! [`DocumentCorpus::from_dir`] walks a directory tree and files every document
//! under a size category, zero or more format categories and one language
//! category, all decided from the file name and size. File lists are sorted by
//! path, so the same directory always yields the same selection in the same
//! order.

use crate::types::{DocumentCategory, FileType};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Upper bounds (exclusive) of the size categories
const SIZE_THRESHOLDS: [(DocumentCategory, u64); 4] = [
    (DocumentCategory::Tiny, 100 * KB),
    (DocumentCategory::Small, MB),
    (DocumentCategory::Medium, 10 * MB),
    (DocumentCategory::Large, 50 * MB),
];

const SCANNED_PDF_MARKERS: [&str; 3] = ["ocr", "scan", "rotated"];
const COMPLEX_PDF_MARKERS: [&str; 5] = ["table", "formula", "equation", "embed", "complex"];
const UNICODE_NAME_MARKERS: [&str; 9] = [
    "hebrew", "german", "chinese", "japanese", "korean", "中国", "北京", "日本", "한국",
];

/// One document in the corpus
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub size: u64,
    pub file_type: Option<FileType>,
}

/// Category assignment for one file
#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub file_type: Option<FileType>,
    pub size_category: DocumentCategory,
    pub format_categories: Vec<DocumentCategory>,
    pub language_category: DocumentCategory,
}

impl Categorization {
    pub fn categories(&self) -> impl Iterator<Item = DocumentCategory> + '_ {
        std::iter::once(self.size_category)
            .chain(self.format_categories.iter().copied())
            .chain(std::iter::once(self.language_category))
    }
}

/// Filename and size heuristics that assign documents to categories
pub struct DocumentCategorizer;

impl DocumentCategorizer {
    /// File type from the extension, with scanned PDFs told apart by name
    pub fn file_type(path: &Path) -> Option<FileType> {
        match FileType::from_path(path)? {
            FileType::Pdf if Self::is_scanned_pdf(path) => Some(FileType::PdfScanned),
            other => Some(other),
        }
    }

    pub fn size_category(size: u64) -> DocumentCategory {
        SIZE_THRESHOLDS
            .iter()
            .find(|(_, upper)| size < *upper)
            .map(|(category, _)| *category)
            .unwrap_or(DocumentCategory::Huge)
    }

    pub fn format_categories(path: &Path, file_type: Option<FileType>) -> Vec<DocumentCategory> {
        let Some(file_type) = file_type else {
            return Vec::new();
        };

        let category = match file_type {
            FileType::PdfScanned => DocumentCategory::PdfScanned,
            FileType::Pdf if Self::is_complex_pdf(path) => DocumentCategory::PdfComplex,
            FileType::Pdf => DocumentCategory::PdfStandard,
            FileType::Docx | FileType::Pptx | FileType::Xlsx | FileType::Xls | FileType::Odt => DocumentCategory::Office,
            FileType::Html => DocumentCategory::Web,
            FileType::Markdown | FileType::Txt | FileType::Rst | FileType::Org => DocumentCategory::Text,
            FileType::Msg | FileType::Eml => DocumentCategory::Email,
            FileType::Epub => DocumentCategory::Ebook,
            FileType::Csv | FileType::Json | FileType::Yaml => DocumentCategory::Data,
            FileType::Png | FileType::Jpg | FileType::Jpeg | FileType::Bmp => DocumentCategory::Images,
            FileType::Rtf => return Vec::new(),
        };
        vec![category]
    }

    pub fn language_category(path: &Path) -> DocumentCategory {
        if Self::has_unicode_name(path) {
            DocumentCategory::Unicode
        } else {
            DocumentCategory::English
        }
    }

    pub fn categorize(path: &Path, size: u64) -> Categorization {
        let file_type = Self::file_type(path);
        Categorization {
            file_type,
            size_category: Self::size_category(size),
            format_categories: Self::format_categories(path, file_type),
            language_category: Self::language_category(path),
        }
    }

    fn lower_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    fn is_scanned_pdf(path: &Path) -> bool {
        let name = Self::lower_name(path);
        SCANNED_PDF_MARKERS.iter().any(|m| name.contains(m))
    }

    fn is_complex_pdf(path: &Path) -> bool {
        let name = Self::lower_name(path);
        COMPLEX_PDF_MARKERS.iter().any(|m| name.contains(m))
    }

    fn has_unicode_name(path: &Path) -> bool {
        let name = Self::lower_name(path);
        UNICODE_NAME_MARKERS.iter().any(|m| name.contains(m))
            || name.chars().any(|c| {
                matches!(c,
                    '\u{0590}'..='\u{05FF}'   // Hebrew
                    | '\u{4E00}'..='\u{9FFF}' // CJK
                    | '\u{3040}'..='\u{30FF}' // Hiragana, Katakana
                    | '\u{AC00}'..='\u{D7AF}' // Hangul
                )
            })
    }
}

/// Documents grouped by category, each list sorted by path
#[derive(Debug, Clone, Default)]
pub struct DocumentCorpus {
    root: PathBuf,
    categories: IndexMap<DocumentCategory, Vec<CorpusFile>>,
    total_files: usize,
}

impl DocumentCorpus {
    /// Scan `dir` recursively and categorize every regular file
    ///
    /// Hidden files and directories (names starting with `.`) are ignored.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::CorpusNotFound(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        collect_files(dir, &mut paths)?;
        paths.sort();

        let mut corpus = Self {
            root: dir.to_path_buf(),
            categories: DocumentCategory::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            total_files: paths.len(),
        };

        for path in paths {
            let size = match std::fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::debug!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };
            let categorization = DocumentCategorizer::categorize(&path, size);
            let file = CorpusFile {
                path,
                size,
                file_type: categorization.file_type,
            };
            for category in categorization.categories() {
                if let Some(files) = corpus.categories.get_mut(&category) {
                    files.push(file.clone());
                }
            }
        }

        tracing::debug!("Scanned {} file(s) under {}", corpus.total_files, dir.display());
        Ok(corpus)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of distinct files scanned
    pub fn len(&self) -> usize {
        self.total_files
    }

    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }

    /// Files in `category`, in path order
    pub fn files(&self, category: DocumentCategory) -> &[CorpusFile] {
        self.categories.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Categories holding at least one file, in declaration order
    pub fn non_empty_categories(&self) -> Vec<DocumentCategory> {
        self.categories
            .iter()
            .filter(|(_, files)| !files.is_empty())
            .map(|(category, _)| *category)
            .collect()
    }

    /// File counts per category, including empty ones
    pub fn category_counts(&self) -> Vec<(DocumentCategory, usize)> {
        self.categories.iter().map(|(c, files)| (*c, files.len())).collect()
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_size_categories() {
        assert_eq!(DocumentCategorizer::size_category(0), DocumentCategory::Tiny);
        assert_eq!(DocumentCategorizer::size_category(100 * KB - 1), DocumentCategory::Tiny);
        assert_eq!(DocumentCategorizer::size_category(100 * KB), DocumentCategory::Small);
        assert_eq!(DocumentCategorizer::size_category(5 * MB), DocumentCategory::Medium);
        assert_eq!(DocumentCategorizer::size_category(10 * MB), DocumentCategory::Large);
        assert_eq!(DocumentCategorizer::size_category(50 * MB), DocumentCategory::Huge);
    }

    #[test]
    fn test_pdf_variants() {
        let scanned = Path::new("docs/Scanned_Invoice.pdf");
        assert_eq!(DocumentCategorizer::file_type(scanned), Some(FileType::PdfScanned));
        assert_eq!(
            DocumentCategorizer::categorize(scanned, 10).format_categories,
            vec![DocumentCategory::PdfScanned]
        );

        let complex = Path::new("docs/embedded-tables.pdf");
        assert_eq!(
            DocumentCategorizer::categorize(complex, 10).format_categories,
            vec![DocumentCategory::PdfComplex]
        );

        let plain = Path::new("docs/report.pdf");
        assert_eq!(
            DocumentCategorizer::categorize(plain, 10).format_categories,
            vec![DocumentCategory::PdfStandard]
        );
    }

    #[test]
    fn test_language_category() {
        assert_eq!(
            DocumentCategorizer::language_category(Path::new("german_letter.docx")),
            DocumentCategory::Unicode
        );
        assert_eq!(
            DocumentCategorizer::language_category(Path::new("北京.txt")),
            DocumentCategory::Unicode
        );
        assert_eq!(
            DocumentCategorizer::language_category(Path::new("שלום.md")),
            DocumentCategory::Unicode
        );
        assert_eq!(
            DocumentCategorizer::language_category(Path::new("readme.md")),
            DocumentCategory::English
        );
    }

    #[test]
    fn test_unknown_extension_has_no_format() {
        let c = DocumentCategorizer::categorize(Path::new("archive.tar"), 10);
        assert!(c.file_type.is_none());
        assert!(c.format_categories.is_empty());
        assert_eq!(c.categories().count(), 2);
    }

    #[test]
    fn test_from_dir_is_sorted_and_deterministic() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("nested/c.txt"), "c").unwrap();
        fs::write(dir.path().join(".hidden.txt"), "h").unwrap();

        let corpus = DocumentCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.len(), 3);

        let text: Vec<_> = corpus
            .files(DocumentCategory::Text)
            .iter()
            .map(|f| f.path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            text,
            vec![PathBuf::from("a.md"), PathBuf::from("b.txt"), PathBuf::from("nested/c.txt")]
        );

        let again = DocumentCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.files(DocumentCategory::Tiny), again.files(DocumentCategory::Tiny));
        assert_eq!(
            corpus.non_empty_categories(),
            vec![DocumentCategory::Tiny, DocumentCategory::Text, DocumentCategory::English]
        );
        assert_eq!(corpus.root(), dir.path());

        let counts = corpus.category_counts();
        assert_eq!(counts.len(), DocumentCategory::ALL.len());
        assert!(counts.contains(&(DocumentCategory::Tiny, 3)));
        assert!(counts.contains(&(DocumentCategory::Office, 0)));
    }

    #[test]
    fn test_missing_dir() {
        let err = DocumentCorpus::from_dir("/definitely/not/here").unwrap_err();
        assert!(matches!(err, Error::CorpusNotFound(_)));
    }
}

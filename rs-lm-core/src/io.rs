use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::{env, io};

use crate::error::{LmError, Result};

/// Opens a text file for buffered line reading.
///
/// The error carries the offending path.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
	let path = path.as_ref();
	let file = File::open(path).map_err(|e| LmError::io(path, e))?;
	Ok(BufReader::new(file))
}

/// Creates (or truncates) a file for buffered writing.
pub fn create_writer<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
	let path = path.as_ref();
	let file = File::create(path).map_err(|e| LmError::io(path, e))?;
	Ok(BufWriter::new(file))
}

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Splits on `\n` / `\r\n`
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
	let path = path.as_ref();
	open_reader(path)?
		.lines()
		.collect::<io::Result<Vec<_>>>()
		.map_err(|e| LmError::io(path, e))
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/model.arpa` + `"bin"` → `data/model.bin`
pub fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path.file_stem().ok_or_else(|| {
		LmError::io(input_path, io::Error::new(io::ErrorKind::InvalidInput, "path has no filename"))
	})?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<String>> {
	let dir = dir.as_ref();
	let mut files = Vec::new();

	for entry in fs::read_dir(dir).map_err(|e| LmError::io(dir, e))? {
		let path = entry.map_err(|e| LmError::io(dir, e))?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Whether `derived` exists and was modified no earlier than `source`.
///
/// Used to decide if a cached artifact can be trusted.
pub fn is_up_to_date<P: AsRef<Path>, Q: AsRef<Path>>(derived: P, source: Q) -> bool {
	let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
	match (modified(derived.as_ref()), modified(source.as_ref())) {
		(Some(derived), Some(source)) => derived >= source,
		_ => false,
	}
}

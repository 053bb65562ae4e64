/// Whether `path` leaves the job's working directory.
///
/// The check is lexical: absolute paths (Unix or Windows style) are outside,
/// and so is any relative path whose `..` segments climb above the root at
/// some point. Blank paths mean the root itself.
pub fn is_outside_sandbox(path: &str) -> bool {
  let path = path.trim();
  if path.is_empty() {
    return false;
  }
  if path.starts_with('/') || path.starts_with('\\') || has_drive_prefix(path) {
    return true;
  }

  let mut depth: usize = 0;
  for segment in path.split(['/', '\\']) {
    match segment {
      "" | "." => {}
      ".." => match depth.checked_sub(1) {
        Some(d) => depth = d,
        None => return true,
      },
      _ => depth += 1,
    }
  }
  false
}

fn has_drive_prefix(path: &str) -> bool {
  let bytes = path.as_bytes();
  bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

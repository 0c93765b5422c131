//! Remote URL construction from `{{ var }}` templates.

use serde::Deserialize;

use crate::{Error, Result};

/// Builds the source locator for a logical repository name.
pub trait Locator: Send + Sync {
	fn repo_url(&self, repo_name: &str) -> Result<String>;
}

/// Templates used by [`UrlFormatter`].
///
/// Available variables: `git_host`, `repo_name`, and per template `sha`,
/// `path` and `ref`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlTemplates {
	pub repo: String,
	pub commit: String,
	pub blob: String,
	pub branch: String,
}

impl Default for UrlTemplates {
	fn default() -> Self {
		Self {
			repo: "https://{{ git_host }}/{{ repo_name }}".into(),
			commit: "https://{{ git_host }}/{{ repo_name }}/commit/{{ sha }}".into(),
			blob: "https://{{ git_host }}/{{ repo_name }}/blob/{{ sha }}/{{ path }}".into(),
			branch: "https://{{ git_host }}/{{ repo_name }}/tree/{{ ref }}".into(),
		}
	}
}

/// Renders repository, commit, blob and branch URLs for one git host.
#[derive(Debug, Clone)]
pub struct UrlFormatter {
	host: String,
	templates: UrlTemplates,
}

impl UrlFormatter {
	pub fn new(host: impl Into<String>, templates: UrlTemplates) -> Self {
		Self {
			host: host.into(),
			templates,
		}
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn commit_url(&self, repo_name: &str, sha: &str) -> Result<String> {
		render(&self.templates.commit, &[("git_host", self.host.as_str()), ("repo_name", repo_name), ("sha", sha)])
	}

	pub fn blob_url(&self, repo_name: &str, sha: &str, path: &str) -> Result<String> {
		render(
			&self.templates.blob,
			&[("git_host", self.host.as_str()), ("repo_name", repo_name), ("sha", sha), ("path", path)],
		)
	}

	pub fn branch_url(&self, repo_name: &str, reference: &str) -> Result<String> {
		render(&self.templates.branch, &[("git_host", self.host.as_str()), ("repo_name", repo_name), ("ref", reference)])
	}
}

impl Locator for UrlFormatter {
	fn repo_url(&self, repo_name: &str) -> Result<String> {
		render(&self.templates.repo, &[("git_host", self.host.as_str()), ("repo_name", repo_name)])
	}
}

/// Substitutes `{{ name }}` placeholders. Unknown names and unclosed braces are errors.
fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = rest.find("{{") {
		out.push_str(&rest[..start]);
		let after = &rest[start + 2..];
		let end = after
			.find("}}")
			.ok_or_else(|| Error::Template(format!("unclosed placeholder in {template:?}")))?;
		let name = after[..end].trim();
		let value = vars
			.iter()
			.find_map(|(key, value)| (*key == name).then_some(*value))
			.ok_or_else(|| Error::Template(format!("unknown variable {name:?} in {template:?}")))?;
		out.push_str(value);
		rest = &after[end + 2..];
	}

	out.push_str(rest);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	fn formatter() -> UrlFormatter {
		UrlFormatter::new("github.com", UrlTemplates::default())
	}

	#[test]
	fn default_templates_render_all_urls() {
		let f = formatter();
		assert_eq!(f.repo_url("org/repo").unwrap(), "https://github.com/org/repo");
		assert_eq!(f.commit_url("org/repo", "abc123").unwrap(), "https://github.com/org/repo/commit/abc123");
		assert_eq!(
			f.blob_url("org/repo", "abc123", "src/lib.rs").unwrap(),
			"https://github.com/org/repo/blob/abc123/src/lib.rs"
		);
		assert_eq!(f.branch_url("org/repo", "main").unwrap(), "https://github.com/org/repo/tree/main");
	}

	#[test]
	fn custom_repo_template_is_used_as_locator() {
		let templates = UrlTemplates {
			repo: "https://{{git_host}}/{{ repo_name }}.git".into(),
			..UrlTemplates::default()
		};
		let f = UrlFormatter::new("git.example.com", templates);
		assert_eq!(f.repo_url("team/service").unwrap(), "https://git.example.com/team/service.git");
	}

	#[rstest]
	#[case("plain text", "plain text")]
	#[case("{{ repo_name }}", "r")]
	#[case("{{repo_name}}-{{  git_host  }}", "r-h")]
	#[case("a {{ repo_name }} b", "a r b")]
	fn render_substitutes_placeholders(#[case] template: &str, #[case] expected: &str) {
		assert_eq!(render(template, &[("repo_name", "r"), ("git_host", "h")]).unwrap(), expected);
	}

	#[rstest]
	#[case("{{ missing }}")]
	#[case("https://{{ git_host }")]
	fn render_rejects_bad_templates(#[case] template: &str) {
		assert!(matches!(render(template, &[("git_host", "h")]), Err(Error::Template(_))));
	}
}

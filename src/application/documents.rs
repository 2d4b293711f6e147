//! Supporting documents written next to the generated page.

use askama::Template;
use time::OffsetDateTime;

#[derive(Template)]
#[template(path = "readme.md")]
struct ReadmeTemplate<'a> {
    repository: &'a str,
    brief: &'a str,
    pages_url: &'a str,
    checks: &'a [String],
    revised: bool,
}

#[derive(Template)]
#[template(path = "license.txt")]
struct LicenseTemplate<'a> {
    year: i32,
    holder: &'a str,
}

pub struct ReadmeContext<'a> {
    pub repository: &'a str,
    pub brief: &'a str,
    pub pages_url: &'a str,
    pub checks: &'a [String],
    pub revised: bool,
}

pub fn render_readme(context: &ReadmeContext<'_>) -> Result<String, askama::Error> {
    ReadmeTemplate {
        repository: context.repository,
        brief: context.brief.trim(),
        pages_url: context.pages_url,
        checks: context.checks,
        revised: context.revised,
    }
    .render()
}

/// MIT license text for `holder`, dated with the current UTC year.
pub fn render_license(holder: &str) -> Result<String, askama::Error> {
    LicenseTemplate {
        year: OffsetDateTime::now_utc().year(),
        holder,
    }
    .render()
}

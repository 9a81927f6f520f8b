//! Theme topic table: domain words mapped to the paths that usually hold them.

use crate::error::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// One topic as written in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTopic {
    pub name: String,
    pub keywords: Vec<String>,
    pub globs: Vec<String>,
    pub boost: f32,
}

impl ThemeTopic {
    pub fn new(name: &str, keywords: &[&str], globs: &[&str], boost: f32) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            globs: globs.iter().map(|g| (*g).to_string()).collect(),
            boost,
        }
    }
}

struct CompiledTopic {
    topic: ThemeTopic,
    paths: GlobSet,
}

pub struct TopicTable {
    topics: Vec<CompiledTopic>,
}

impl TopicTable {
    pub fn new(topics: Vec<ThemeTopic>) -> Result<Self> {
        let mut compiled = Vec::with_capacity(topics.len());
        for topic in topics {
            let mut builder = GlobSetBuilder::new();
            for glob in &topic.globs {
                builder.add(GlobBuilder::new(glob).literal_separator(true).build()?);
            }
            compiled.push(CompiledTopic {
                paths: builder.build()?,
                topic,
            });
        }
        Ok(Self { topics: compiled })
    }

    /// Topics triggered by any of the query terms.
    pub fn triggered<'a>(&'a self, terms: &'a [String]) -> impl Iterator<Item = &'a ThemeTopic> + 'a {
        self.topics
            .iter()
            .filter(|c| c.topic.keywords.iter().any(|k| terms.contains(k)))
            .map(|c| &c.topic)
    }

    /// Highest boost among triggered topics whose globs match `path`.
    pub fn boost(&self, terms: &[String], path: &str) -> Option<f32> {
        self.topics
            .iter()
            .filter(|c| c.topic.keywords.iter().any(|k| terms.contains(k)))
            .filter(|c| c.paths.is_match(path))
            .map(|c| c.topic.boost)
            .fold(None, |best: Option<f32>, b| Some(best.map_or(b, |x| x.max(b))))
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

pub fn builtin_topics() -> Vec<ThemeTopic> {
    vec![
        ThemeTopic::new(
            "header",
            &["header", "announcement", "logo", "masthead"],
            &["**/*header*", "**/*announcement*"],
            10.0,
        ),
        ThemeTopic::new(
            "footer",
            &["footer", "newsletter", "copyright"],
            &["**/*footer*", "**/*newsletter*"],
            10.0,
        ),
        ThemeTopic::new(
            "product",
            &["product", "pdp", "variant", "price", "gallery"],
            &["**/*product*", "**/*price*", "**/*variant*"],
            9.0,
        ),
        ThemeTopic::new(
            "collection",
            &["collection", "collections", "plp", "filter", "filters", "facets"],
            &["**/*collection*", "**/*facets*", "**/*filter*"],
            9.0,
        ),
        ThemeTopic::new(
            "cart",
            &["cart", "basket", "checkout", "drawer"],
            &["**/*cart*"],
            10.0,
        ),
        ThemeTopic::new(
            "navigation",
            &["navigation", "nav", "menu", "megamenu", "breadcrumb", "breadcrumbs"],
            &["**/*menu*", "**/*nav*", "**/*header*", "**/*breadcrumb*"],
            8.0,
        ),
        ThemeTopic::new(
            "search",
            &["search", "predictive"],
            &["**/*search*"],
            9.0,
        ),
        ThemeTopic::new(
            "hero",
            &["hero", "banner", "slideshow", "slider", "carousel"],
            &["**/*banner*", "**/*hero*", "**/*slideshow*", "**/*slider*"],
            8.0,
        ),
        ThemeTopic::new(
            "typography",
            &["font", "fonts", "typography", "heading", "headings", "typeface"],
            &["assets/*.css", "assets/*.scss", "config/settings_schema.json"],
            8.0,
        ),
        ThemeTopic::new(
            "colors",
            &["color", "colors", "colour", "colours", "palette", "scheme"],
            &["config/settings_*.json", "assets/base.css", "assets/*color*"],
            8.0,
        ),
    ]
}

pub(crate) static BUILTIN: Lazy<Arc<TopicTable>> = Lazy::new(|| {
    Arc::new(TopicTable::new(builtin_topics()).expect("valid builtin topic globs"))
});

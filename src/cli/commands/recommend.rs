//! Recommend Command

use crate::cli::util::CommandContext;
use crate::cli::{Format, Output};
use crate::types::{RecommendationSource, Result};

pub fn run(limit: Option<usize>, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let user = ctx.current_user()?;
    let limit = limit.unwrap_or(ctx.config.recommend.default_limit);

    let recs = ctx.recommender().recommend(&user.username, limit)?;

    let out = Output::new();
    if format == Format::Json {
        return out.json(&recs);
    }
    if recs.is_empty() {
        out.info("Nothing to recommend yet");
        return Ok(());
    }

    if recs[0].source == RecommendationSource::Popularity {
        out.info("Not enough borrowing history; showing popular books");
    }
    let rows: Vec<Vec<String>> = recs
        .iter()
        .enumerate()
        .map(|(i, r)| {
            vec![
                (i + 1).to_string(),
                r.book_id.to_string(),
                r.title.clone(),
                r.author.clone(),
                r.available.to_string(),
                format!("{:.3}", r.score),
            ]
        })
        .collect();
    out.table(&["#", "ID", "TITLE", "AUTHOR", "AVAIL", "SCORE"], &rows);
    Ok(())
}

//! Channel catalog handlers.

use tabled::Tabled;

use chanline_config::Config;
use chanline_core::Channel;

use crate::cli::{ChannelsArgs, ChannelsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Quality")]
    quality: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl From<&Channel> for ChannelRow {
    fn from(c: &Channel) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            quality: c.nominal_quality.to_string(),
            category: c.category.clone().unwrap_or_default(),
            url: c.url.to_string(),
        }
    }
}

fn in_category(channel: &Channel, category: Option<&str>) -> bool {
    category.is_none_or(|wanted| {
        channel
            .category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
    })
}

pub fn handle(args: &ChannelsArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ChannelsCommand::List { ref category } => {
            let channels: Vec<Channel> = cfg
                .channels()?
                .into_iter()
                .filter(|c| in_category(c, category.as_deref()))
                .collect();

            let format = util::output_format(global);
            if channels.is_empty() && matches!(format, OutputFormat::Table) {
                eprintln!("No channels. Add [[channels]] entries to the config file.");
                return Ok(());
            }

            let out = output::render_list(
                format,
                &channels,
                |c| ChannelRow::from(c),
                |c| c.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chanline_core::QualityTier;

    fn channel(category: Option<&str>) -> Channel {
        Channel {
            id: "news".into(),
            name: "News 24".into(),
            url: "https://example.com/news.m3u8".parse().unwrap(),
            nominal_quality: QualityTier::Hd,
            category: category.map(Into::into),
        }
    }

    #[test]
    fn category_filter_ignores_case() {
        assert!(in_category(&channel(Some("News")), Some("news")));
        assert!(!in_category(&channel(Some("Sports")), Some("news")));
        assert!(!in_category(&channel(None), Some("news")));
        assert!(in_category(&channel(None), None));
    }

    #[test]
    fn row_shows_tier_label() {
        let row = ChannelRow::from(&channel(None));
        assert_eq!(row.quality, "HD");
        assert!(row.category.is_empty());
    }
}

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use std::collections::BTreeSet;
use url::Url;

use crate::types::{Article, Category, StoredUser, User};

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo123";

/// The demo account every fresh backend starts with.
pub fn demo_users() -> Vec<StoredUser> {
    vec![StoredUser {
        user: User {
            id: "1".to_string(),
            username: DEMO_USERNAME.to_string(),
            email: DEMO_EMAIL.to_string(),
            selected_categories: BTreeSet::from([Category::Technology, Category::Science]),
            created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        },
        password: SecretString::from(DEMO_PASSWORD.to_string()),
    }]
}

struct SeedArticle {
    id: u64,
    title: &'static str,
    summary: &'static str,
    category: Category,
    slug: &'static str,
    /// (year, month, day, hour, minute), UTC
    date: (i32, u32, u32, u32, u32),
}

const SEED: &[SeedArticle] = &[
    SeedArticle {
        id: 1,
        title: "Revolutionary AI Breakthrough Changes Everything",
        summary: "Scientists announce a major breakthrough in artificial intelligence that could transform how we interact with technology. The new system shows unprecedented capabilities in understanding and reasoning.",
        category: Category::Technology,
        slug: "ai-breakthrough",
        date: (2024, 1, 15, 10, 30),
    },
    SeedArticle {
        id: 2,
        title: "Championship Game Ends in Spectacular Fashion",
        summary: "The season finale delivered an unforgettable match with last-minute plays that kept fans on the edge of their seats. Both teams showcased exceptional skill and determination.",
        category: Category::Sports,
        slug: "championship-game",
        date: (2024, 1, 14, 20, 15),
    },
    SeedArticle {
        id: 3,
        title: "Global Climate Summit Reaches Historic Agreement",
        summary: "World leaders unite on unprecedented climate action plan. The agreement includes ambitious targets for carbon reduction and significant funding for renewable energy initiatives.",
        category: Category::Politics,
        slug: "climate-summit",
        date: (2024, 1, 14, 14, 45),
    },
    SeedArticle {
        id: 4,
        title: "Tech Giant Reports Record Quarterly Earnings",
        summary: "The company exceeded all expectations with a 45% increase in revenue, driven by strong demand for cloud services and AI-powered products. Stock prices surge in after-hours trading.",
        category: Category::Business,
        slug: "tech-earnings",
        date: (2024, 1, 13, 16, 20),
    },
    SeedArticle {
        id: 5,
        title: "Blockbuster Movie Breaks Opening Weekend Records",
        summary: "The highly anticipated sequel smashes box office records, earning over $200 million worldwide in its opening weekend. Critics and audiences alike praise the film's innovative storytelling.",
        category: Category::Entertainment,
        slug: "blockbuster-movie",
        date: (2024, 1, 13, 11, 0),
    },
    SeedArticle {
        id: 6,
        title: "Breakthrough Medical Treatment Shows Promise",
        summary: "Clinical trials reveal remarkable success rates for a new cancer treatment. The therapy shows minimal side effects and significant improvement in patient outcomes across multiple cancer types.",
        category: Category::Health,
        slug: "medical-breakthrough",
        date: (2024, 1, 12, 9, 30),
    },
    SeedArticle {
        id: 7,
        title: "Space Mission Discovers Potentially Habitable Planet",
        summary: "NASA's latest space telescope identifies an Earth-like planet in the habitable zone of a nearby star system. Scientists are excited about the possibility of finding signs of life.",
        category: Category::Science,
        slug: "space-discovery",
        date: (2024, 1, 12, 7, 15),
    },
    SeedArticle {
        id: 8,
        title: "International Trade Agreement Reshapes Global Economy",
        summary: "Major economies sign comprehensive trade deal that promises to reduce tariffs and boost international commerce. Experts predict significant positive impact on global growth.",
        category: Category::World,
        slug: "trade-agreement",
        date: (2024, 1, 11, 18, 45),
    },
    SeedArticle {
        id: 9,
        title: "Quantum Computing Milestone Achieved",
        summary: "Researchers demonstrate quantum supremacy in solving complex computational problems. The achievement brings us closer to practical quantum computing applications in various industries.",
        category: Category::Technology,
        slug: "quantum-computing",
        date: (2024, 1, 11, 13, 20),
    },
    SeedArticle {
        id: 10,
        title: "Olympic Champions Announce Retirement",
        summary: "Two legendary athletes who dominated their sports for over a decade announce their retirement. Their careers include multiple Olympic gold medals and world records.",
        category: Category::Sports,
        slug: "athlete-retirement",
        date: (2024, 1, 10, 15, 30),
    },
];

impl SeedArticle {
    fn build(&self) -> Option<Article> {
        let (y, mo, d, h, mi) = self.date;
        let date = Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single()?;
        let source_url = Url::parse(&format!("https://example.com/{}", self.slug)).ok()?;
        let image_url =
            Url::parse(&format!("https://picsum.photos/400/200?random={}", self.id)).ok();

        Some(Article {
            id: self.id,
            title: self.title.to_string(),
            summary: self.summary.to_string(),
            category: self.category,
            source_url,
            date,
            image_url,
        })
    }
}

/// The ten demo articles, newest first.
pub fn demo_articles() -> Vec<Article> {
    SEED.iter()
        .filter_map(|seed| {
            let article = seed.build();
            if article.is_none() {
                tracing::error!(id = seed.id, "Skipping malformed seed article");
            }
            article
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_seed_articles_build() {
        let articles = demo_articles();
        assert_eq!(articles.len(), 10);
        assert!(articles.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[test]
    fn test_demo_user_has_no_password_in_json() {
        let users = demo_users();
        let json = serde_json::to_string(&users[0].user).unwrap();
        assert!(!json.contains(DEMO_PASSWORD));
    }
}

use movie_search_client::client::omdb::OmdbConfig;
use movie_search_client::client::tmdb::TmdbConfig;
use movie_search_client::{ClientConfig, MovieClient, Query};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("🚀 Movie search caching walkthrough");

    let config = ClientConfig {
        omdb: OmdbConfig {
            api_key: std::env::var("OMDB_API_KEY")?,
            ..OmdbConfig::default()
        },
        tmdb: TmdbConfig {
            api_key: std::env::var("TMDB_API_KEY")?,
            ..TmdbConfig::default()
        },
        ..ClientConfig::default()
    };
    let client = MovieClient::new(config);

    println!("\n1️⃣ Initial cache statistics...");
    let stats = client.cache_stats();
    println!(
        "   query: {} entries / {} max, detail: {} entries / {} max",
        stats.query.total_entries,
        stats.query.max_entries,
        stats.detail.total_entries,
        stats.detail.max_entries
    );

    let query = Query::new().title("The Dark Knight").actor("Heath Ledger");

    println!("2️⃣ First search (goes to the providers)...");
    let start = std::time::Instant::now();
    let first = client.search(&query).await?;
    let duration1 = start.elapsed();
    println!("   ⏱️ took {:?}, {} results", duration1, first.total_results);
    for movie in &first.search_results {
        println!(
            "   🎬 {} ({}) [{}] {}",
            movie.title(),
            movie.year(),
            movie.source_api(),
            movie.external_id()
        );
    }
    if first.is_partial() {
        println!("   ⚠️ Unavailable providers: {:?}", first.unavailable_providers);
    }

    println!("3️⃣ Same search again (should come from the query cache)...");
    let start = std::time::Instant::now();
    let second = client.search(&query).await?;
    let duration2 = start.elapsed();
    println!("   ⏱️ took {:?}, {} results", duration2, second.total_results);

    if duration2.as_millis() < 10 {
        println!("   ✅ Cache is working! Second search was nearly instant.");
    } else {
        println!("   ⚠️ Second search was not cached (partial responses are never cached).");
    }

    println!("4️⃣ Final cache statistics:");
    let stats = client.cache_stats();
    println!(
        "   query: {} hits / {} misses, detail: {} entries",
        stats.query.hits, stats.query.misses, stats.detail.total_entries
    );

    Ok(())
}

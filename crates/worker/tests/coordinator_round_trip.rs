//! Real workers against a real coordinator over loopback TCP.

use std::sync::Arc;

use coordinator::{partitioner, Coordinator, CoordinatorConfig};
use data_loader::{Rating, RatingIndex};
use worker::{FactorizationScorer, ItemMeanScorer, Scorer, WorkerNode};

fn dataset() -> RatingIndex {
    let mut ratings = vec![
        Rating::new("target", "m1", 5.0),
        Rating::new("target", "m2", 4.0),
    ];
    for u in 0..8 {
        let user = format!("u{}", u);
        ratings.push(Rating::new(user.as_str(), "m1", 4.0 + (u % 2) as f64));
        ratings.push(Rating::new(user.as_str(), "m3", 2.0 + (u % 3) as f64));
        ratings.push(Rating::new(user.as_str(), "m4", 3.0));
    }
    RatingIndex::from_ratings(ratings)
}

async fn run_with(scorer: Arc<dyn Scorer>, num_shards: usize) -> coordinator::RunSummary {
    let index = dataset();
    let shards = partitioner::shards_for_target(&index, "target", num_shards).unwrap();

    let coordinator = Coordinator::bind(CoordinatorConfig::new("127.0.0.1:0", num_shards))
        .await
        .unwrap();
    let addr = coordinator.local_addr().unwrap().to_string();

    let workers: Vec<_> = (0..num_shards)
        .map(|_| {
            let addr = addr.clone();
            let scorer = Arc::clone(&scorer);
            tokio::spawn(async move { WorkerNode::connect(addr, scorer).await?.run().await })
        })
        .collect();

    let summary = coordinator.recommend(shards).await;
    for worker in workers {
        let report = worker.await.unwrap().unwrap();
        assert_eq!(report.target_user_id, "target");
    }
    summary
}

#[tokio::test]
async fn test_item_mean_workers_sum_partial_scores() {
    let summary = run_with(Arc::new(ItemMeanScorer), 2).await;
    assert_eq!(summary.report.succeeded(), 2);

    // Every shard sees m3 and m4; each worker contributes its local mean
    let movies: Vec<&str> = summary
        .ranked
        .entries()
        .iter()
        .map(|m| m.movie_id.as_str())
        .collect();
    assert_eq!(movies.len(), 2);
    assert!(movies.contains(&"m3"));
    assert!(movies.contains(&"m4"));

    let m4 = summary
        .ranked
        .entries()
        .iter()
        .find(|m| m.movie_id == "m4")
        .unwrap();
    assert_eq!(m4.score, 6.0);
}

#[tokio::test]
async fn test_factorization_workers_never_recommend_seen_movies() {
    let summary = run_with(Arc::new(FactorizationScorer::new()), 3).await;
    assert_eq!(summary.report.succeeded(), 3);
    // Round-robin over three ratings per user puts all of m3 in one shard
    // and all of m4 in another
    let movies: Vec<&str> = summary
        .ranked
        .entries()
        .iter()
        .map(|m| m.movie_id.as_str())
        .collect();
    assert_eq!(movies.len(), 2);
    assert!(movies.contains(&"m3") && movies.contains(&"m4"));
    for movie in summary.ranked.entries() {
        assert!((1.0..=5.0).contains(&movie.score));
    }
}

use axum::Router;
use firetrain_api::{config::Config, create_router, services::AppState};
use mongodb::bson::{doc, oid::ObjectId};
use std::sync::Arc;

/// Fixed id of the module seeded into the test database
#[allow(dead_code)]
pub const TEST_MODULE_ID: &str = "66a0f0000000000000000001";

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    eprintln!("MongoDB connected");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    eprintln!("Redis client created, attempting connection...");

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    eprintln!("AppState initialized successfully");

    app_state
        .ensure_indexes()
        .await
        .expect("Failed to create test indexes");

    // Seed test data
    seed_test_data(&mongo_client, &config.mongo_database).await;

    // Build test router (same as main app)
    create_router(app_state)
}

async fn seed_test_data(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let modules_collection = db.collection::<mongodb::bson::Document>("modules");

    let module_id = ObjectId::parse_str(TEST_MODULE_ID).unwrap();

    // Create test module if it doesn't exist
    let module_exists = modules_collection
        .find_one(doc! { "_id": module_id })
        .await
        .unwrap();

    if module_exists.is_none() {
        let quiz = serde_json::json!({
            "quiz": [
                {
                    "question": "Which fire class covers flammable liquids?",
                    "options": ["Class A", "Class B", "Class C", "Class D"],
                    "answer": "Class B"
                },
                {
                    "question": "What does the P in the PASS technique stand for?",
                    "options": ["Push", "Pull", "Point", "Press"],
                    "answer": "Pull"
                },
                {
                    "question": "Which extinguishing agent must never be used on an electrical fire?",
                    "options": ["Water", "CO2", "Dry powder", "Clean agent"],
                    "answer": "Water"
                },
                {
                    "question": "What is the first action when a fire alarm sounds?",
                    "options": ["Collect belongings", "Evacuate immediately", "Call a colleague", "Finish the task"],
                    "answer": "Evacuate immediately"
                }
            ]
        });

        // Try to insert, ignore duplicate key error (race condition with parallel tests)
        let result = modules_collection
            .insert_one(doc! {
                "_id": module_id,
                "title": "Fire Extinguisher Basics",
                "reading_document": "Portable extinguishers are rated by the classes of fire they can put out.",
                "videos": ["https://example.com/videos/extinguisher-101"],
                "mcq_assignment": quiz.to_string(),
                "reading_time": 5,
                "videos_time": 5,
                "assignment_time": 10,
                "createdAt": mongodb::bson::DateTime::now(),
            })
            .await;

        match result {
            Ok(_) => eprintln!("Test module seeded in MongoDB"),
            Err(e) => {
                // Ignore duplicate key error (code 11000)
                if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
                    ref we,
                )) = *e.kind
                {
                    if we.code == 11000 {
                        eprintln!("Test module already exists (inserted by parallel test)");
                        return;
                    }
                }
                panic!("Failed to seed test module: {:?}", e);
            }
        }
    }
}

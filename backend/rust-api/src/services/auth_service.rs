use crate::errors::ApiError;
use crate::middlewares::auth::JwtService;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile};
use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use redis::aio::ConnectionManager;

pub struct AuthService {
    mongo: Database,
    redis: ConnectionManager,
    jwt_service: JwtService,
    token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, redis: ConnectionManager, jwt_service: JwtService) -> Self {
        // Read TTL from env or use default
        let token_ttl_seconds = std::env::var("JWT_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(86400); // Default: 24 hours

        Self {
            mongo,
            redis,
            jwt_service,
            token_ttl_seconds,
        }
    }

    /// Hash a password using bcrypt with cost 12
    pub fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        Ok(hash(password, DEFAULT_COST).context("Failed to hash password")?)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        Ok(verify(password, hash).context("Failed to verify password")?)
    }

    /// Register a new user
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let users_collection = self.mongo.collection::<User>("users");

        // Check if user already exists
        let existing_user = users_collection
            .find_one(doc! { "email": &req.email })
            .await
            .context("Failed to check existing user")?;

        if existing_user.is_some() {
            return Err(ApiError::conflict("User with this email already exists"));
        }

        let password_hash = self.hash_password(&req.password)?;

        let user = User {
            id: None, // MongoDB will generate
            name: req.name,
            email: req.email,
            mobile: req.mobile,
            password_hash,
            role: req.role.unwrap_or_default(), // Default to trainee
            created_at: Utc::now(),
        };

        let insert_result = match users_collection.insert_one(&user).await {
            Ok(result) => result,
            // Second writer of a concurrent register loses on the unique
            // email index; present that the same way as the pre-check.
            Err(err) if super::is_duplicate_key(&err) => {
                return Err(ApiError::conflict("User with this email already exists"));
            }
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context("Failed to insert user")
                    .into());
            }
        };

        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal("Failed to get inserted user ID"))?;

        let access_token = self.generate_access_token(&user_id, &user)?;

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);

        Ok(AuthResponse {
            access_token,
            user: UserProfile::from(user_with_id),
        })
    }

    /// Login with email and password
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let users_collection = self.mongo.collection::<User>("users");

        let user = users_collection
            .find_one(doc! { "email": &req.email })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(email = %req.email, "Failed login attempt: invalid password");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }

        let user_id = user
            .id
            .ok_or_else(|| ApiError::internal("User ID not found"))?;

        let access_token = self.generate_access_token(&user_id, &user)?;

        tracing::info!(
            user_id = %user_id.to_hex(),
            email = %req.email,
            "Successful login"
        );

        Ok(AuthResponse {
            access_token,
            user: UserProfile::from(user),
        })
    }

    /// Generate JWT access token
    fn generate_access_token(&self, user_id: &ObjectId, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.token_ttl_seconds);

        let claims = crate::middlewares::auth::JwtClaims {
            sub: user_id.to_hex(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(claims)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Get user by ID (from validated token claims)
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        let object_id = ObjectId::parse_str(user_id)
            .map_err(|_| ApiError::invalid_input("Invalid user ID format"))?;

        let collection = self.mongo.collection::<User>("users");
        collection
            .find_one(doc! { "_id": object_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Check if account is locked due to failed login attempts
    /// Returns true if locked (>= 5 failed attempts within TTL window)
    pub async fn check_failed_attempts(&self, email: &str) -> Result<bool, ApiError> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        let count: Option<u32> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("Failed to query failed login attempts")?;

        Ok(count.unwrap_or(0) >= 5)
    }

    /// Increment failed login attempts counter
    /// Returns current count after increment
    /// Sets TTL to 15 minutes (900 seconds) on first failed attempt
    pub async fn increment_failed_attempts(&self, email: &str) -> Result<u32, ApiError> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        let count: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("Failed to increment failed login attempts")?;

        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(900) // 15 minutes in seconds
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to set TTL for failed login attempts")?;
        }

        Ok(count)
    }

    /// Clear failed login attempts counter (called on successful login)
    pub async fn clear_failed_attempts(&self, email: &str) -> Result<(), ApiError> {
        let key = format!("failed_login:{}", email);
        let mut conn = self.redis.clone();

        redis::cmd("DEL")
            .arg(&key)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to clear failed login attempts")?;

        Ok(())
    }
}

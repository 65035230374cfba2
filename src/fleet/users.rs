use async_trait::async_trait;
use tracing::info;

use super::validate_email;
use crate::error::{FleetError, FleetResult};
use crate::models::User;
use crate::store::FleetTransaction;
use crate::txn::{TransactionExecutor, UnitOfWork};

/// Plain CRUD over `users`; emails are the key.
#[derive(Clone)]
pub struct UserRegistry {
    executor: TransactionExecutor,
}

impl UserRegistry {
    pub fn new(executor: TransactionExecutor) -> Self {
        Self { executor }
    }

    /// A second registration with the same email is a `ConstraintViolation`.
    pub async fn register_user(&self, user: &User) -> FleetResult<()> {
        validate_email(&user.email)?;
        let user = User {
            email: user.email.trim().to_string(),
            ..user.clone()
        };
        self.executor.run(&RegisterUser { user }).await?;
        info!("Registered user");
        Ok(())
    }

    pub async fn get_user(&self, email: &str) -> FleetResult<User> {
        validate_email(email)?;
        self.executor
            .run(&GetUser {
                email: email.trim().to_string(),
            })
            .await
    }

    pub async fn delete_user(&self, email: &str) -> FleetResult<()> {
        validate_email(email)?;
        self.executor
            .run(&DeleteUser {
                email: email.trim().to_string(),
            })
            .await
    }
}

struct RegisterUser {
    user: User,
}

#[async_trait]
impl UnitOfWork for RegisterUser {
    type Output = ();

    fn name(&self) -> &'static str {
        "register_user"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<()> {
        Ok(tx.insert_user(&self.user).await?)
    }
}

struct GetUser {
    email: String,
}

#[async_trait]
impl UnitOfWork for GetUser {
    type Output = User;

    fn name(&self) -> &'static str {
        "get_user"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<User> {
        tx.fetch_user(&self.email)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("user {}", self.email)))
    }
}

struct DeleteUser {
    email: String,
}

#[async_trait]
impl UnitOfWork for DeleteUser {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_user"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<()> {
        if tx.delete_user(&self.email).await? {
            Ok(())
        } else {
            Err(FleetError::NotFound(format!("user {}", self.email)))
        }
    }
}

//! Token command - mints a development JWT

use anyhow::anyhow;
use clap::Args;

use crate::domain::{OrgId, SignedInUser, UserId};
use crate::infrastructure::auth::{JwtConfig, JwtGenerator, JwtService};

#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    #[arg(long)]
    pub user_id: i64,

    #[arg(long, default_value_t = 1)]
    pub org_id: i64,

    #[arg(long)]
    pub login: String,

    #[arg(long)]
    pub server_admin: bool,

    /// `action=scope` pair; repeatable
    #[arg(long = "grant")]
    pub grants: Vec<String>,
}

/// Print a signed token for the described identity
pub async fn run(args: TokenArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let user = identity(&args)?;

    let service = JwtService::new(JwtConfig::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_hours,
    ));

    println!("{}", service.generate(&user)?);
    Ok(())
}

fn identity(args: &TokenArgs) -> anyhow::Result<SignedInUser> {
    let mut user = SignedInUser::new(OrgId::new(args.org_id), UserId::new(args.user_id), &args.login)
        .with_server_admin(args.server_admin);

    for grant in &args.grants {
        let (action, scope) = grant
            .split_once('=')
            .ok_or_else(|| anyhow!("Grant '{}' must look like action=scope", grant))?;
        user = user.with_permission(action, [scope]);
    }

    Ok(user)
}

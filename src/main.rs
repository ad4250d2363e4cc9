//! Fitness AI Gateway 服务主入口

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fitness_ai_gateway::business::services::ProviderRegistry;
use fitness_ai_gateway::{create_routes, AppState, Config};

/// 命令行参数，优先级高于环境变量
#[derive(Debug, Parser)]
#[command(name = "fitness-ai-gateway", version, about = "Fitness AI coaching gateway")]
struct Args {
    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(long)]
    port: Option<u16>,

    /// 默认激活的生成服务（gemini / claude）
    #[arg(long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志 - 默认INFO等级，便于生产环境使用
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitness_ai_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("🚀 启动 Fitness AI Gateway 服务");

    // 加载配置
    let mut config = Config::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(provider) = args.provider {
        config.generation.provider = provider;
    }
    info!("✅ 配置加载成功");

    if config.gemini.api_key.is_empty() {
        warn!("⚠️ 未设置 GEMINI_API_KEY，调用 gemini 的请求将会失败");
    }

    // 初始化生成服务注册表
    let providers = Arc::new(ProviderRegistry::with_builtin(
        config.generation.provider.clone(),
        config.gemini.clone(),
    ));
    if let Err(e) = providers.set_active(&config.generation.provider).await {
        anyhow::bail!("无效的生成服务配置: {}", e);
    }
    info!("✅ 生成服务: {} (可用: {:?})", config.generation.provider, providers.provider_names());

    // 组装服务并启动后台任务
    let state = AppState::new(&config, providers);
    let _background = state.spawn_background_tasks(&config);
    info!("✅ 缓存清扫与限流清理任务已启动");

    let app = create_routes(state);
    info!("✅ 路由创建成功");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 服务器启动成功，监听: {}", addr);
    info!("   模型: {}", config.gemini.model);
    info!(
        "   限流: {} 次/{}s",
        config.rate_limit.max_requests,
        config.rate_limit.window_ms / 1000
    );
    info!("   缓存TTL: {}s", config.cache.ttl_ms / 1000);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .tcp_nodelay(true)
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 接收到关闭信号，正在优雅关闭服务器...");
    });

    server.await?;

    Ok(())
}

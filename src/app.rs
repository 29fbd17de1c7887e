use anyhow::{Context, Result};
use bulkops_api::{create_app_with_cors, AppState};
use bulkops_core::config::AppConfig;
use bulkops_dispatcher::metrics::register_metrics;
use bulkops_infrastructure::{create_notification_provider, MaintenanceService, Repositories};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 主应用程序：存储、批量操作服务、维护任务和HTTP服务器
pub struct Application {
    config: AppConfig,
    state: AppState,
    maintenance: MaintenanceService,
}

impl Application {
    /// 按配置装配所有组件
    pub async fn new(config: AppConfig) -> Result<Self> {
        let repositories = Repositories::from_config(&config.database)
            .await
            .context("初始化存储失败")?;
        info!("存储后端: {}", repositories.backend_name());

        let provider =
            create_notification_provider(&config.notification).context("创建通知服务失败")?;
        info!("通知服务: {}", provider.name());

        let mut state = AppState::build(repositories.clone(), provider, &config);
        if config.observability.metrics_enabled {
            state = state.with_metrics_handle(install_metrics_recorder()?);
        }

        let maintenance = MaintenanceService::new(
            repositories.idempotency.clone(),
            repositories.dead_letters.clone(),
            config.maintenance.clone(),
            config.dlq.clone(),
        );

        Ok(Self {
            config,
            state,
            maintenance,
        })
    }

    /// 运行到收到关闭信号为止
    pub async fn run(mut self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.maintenance.start();

        let result = if self.config.api.enabled {
            self.run_api(shutdown_rx).await
        } else {
            info!("API服务已禁用，仅运行维护任务");
            wait_for(shutdown_rx).await;
            Ok(())
        };

        self.maintenance.stop().await;
        self.state.repositories.close().await;
        result
    }

    async fn run_api(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let app = create_app_with_cors(self.state.clone(), self.config.api.cors_enabled);

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(wait_for(shutdown_rx))
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已停止");
        Ok(())
    }
}

async fn wait_for(mut shutdown_rx: broadcast::Receiver<()>) {
    if let Err(e) = shutdown_rx.recv().await {
        warn!("关闭信号通道异常: {}", e);
    }
}

/// 安装全局 Prometheus 记录器并注册指标描述
fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("安装Prometheus指标记录器失败")?;
    register_metrics();
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkops_core::config::StorageBackend;
    use std::time::Duration;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.backend = StorageBackend::Memory;
        config.api.bind_address = "127.0.0.1:0".to_string();
        config.observability.metrics_enabled = false;
        config
    }

    #[tokio::test]
    async fn test_application_stops_on_shutdown() {
        let app = Application::new(memory_config()).await.unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(app.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_application_without_api() {
        let mut config = memory_config();
        config.api.enabled = false;
        config.maintenance.enabled = false;
        let app = Application::new(config).await.unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(app.run(rx));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}

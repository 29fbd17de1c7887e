use std::sync::Arc;

use bulkops_core::config::{DlqConfig, MaintenanceConfig};
use bulkops_core::traits::{DeadLetterRepository, IdempotencyRepository};
use bulkops_core::BulkOpsResult;
use chrono::{Duration, Utc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// 一次维护操作的统计
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    /// 清理的过期幂等记录数
    pub idempotency_purged: u64,
    /// 按保留期清理的死信条目数
    pub dlq_purged: u64,
    pub duration: std::time::Duration,
}

impl MaintenanceStats {
    pub fn total_purged(&self) -> u64 {
        self.idempotency_purged + self.dlq_purged
    }
}

/// 后台维护服务
///
/// 定期清理过期的幂等记录，并在配置了保留期时清理过旧的死信条目。
pub struct MaintenanceService {
    idempotency_repository: Arc<dyn IdempotencyRepository>,
    dead_letter_repository: Arc<dyn DeadLetterRepository>,
    config: MaintenanceConfig,
    dlq_config: DlqConfig,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    maintenance_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MaintenanceService {
    pub fn new(
        idempotency_repository: Arc<dyn IdempotencyRepository>,
        dead_letter_repository: Arc<dyn DeadLetterRepository>,
        config: MaintenanceConfig,
        dlq_config: DlqConfig,
    ) -> Self {
        Self {
            idempotency_repository,
            dead_letter_repository,
            config,
            dlq_config,
            shutdown_tx: None,
            maintenance_handle: None,
        }
    }

    /// 启动维护循环
    pub fn start(&mut self) {
        if !self.config.enabled {
            info!("维护服务已禁用");
            return;
        }
        if self.maintenance_handle.is_some() {
            warn!("维护服务已在运行");
            return;
        }

        info!("启动维护服务，间隔 {} 秒", self.config.interval_seconds);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let idempotency_repository = Arc::clone(&self.idempotency_repository);
        let dead_letter_repository = Arc::clone(&self.dead_letter_repository);
        let interval_seconds = self.config.interval_seconds.max(1);
        let dlq_config = self.dlq_config.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(std::time::Duration::from_secs(interval_seconds));

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = Self::perform_maintenance(
                            &idempotency_repository,
                            &dead_letter_repository,
                            &dlq_config,
                        ).await {
                            error!("维护任务执行失败: {}", e);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("收到维护服务停止信号");
                        break;
                    }
                }
            }
        });

        self.maintenance_handle = Some(handle);
    }

    /// 停止维护循环并等待其退出
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(handle) = self.maintenance_handle.take() {
            if let Err(e) = handle.await {
                warn!("等待维护服务退出时出错: {}", e);
            }
        }

        info!("维护服务已停止");
    }

    pub fn is_running(&self) -> bool {
        self.maintenance_handle.is_some()
    }

    /// 立即执行一次维护
    pub async fn run_once(&self) -> BulkOpsResult<MaintenanceStats> {
        Self::perform_maintenance(
            &self.idempotency_repository,
            &self.dead_letter_repository,
            &self.dlq_config,
        )
        .await
    }

    async fn perform_maintenance(
        idempotency_repository: &Arc<dyn IdempotencyRepository>,
        dead_letter_repository: &Arc<dyn DeadLetterRepository>,
        dlq_config: &DlqConfig,
    ) -> BulkOpsResult<MaintenanceStats> {
        let start_time = std::time::Instant::now();
        let now = Utc::now();
        let mut stats = MaintenanceStats {
            idempotency_purged: idempotency_repository.purge_expired(now).await?,
            ..Default::default()
        };

        if let Some(days) = dlq_config.retention_days {
            let cutoff = now - Duration::days(i64::from(days));
            stats.dlq_purged = dead_letter_repository.purge_older_than(cutoff).await?;
        }

        stats.duration = start_time.elapsed();
        if stats.total_purged() > 0 {
            info!(
                "维护完成: 清理 {} 条幂等记录, {} 条死信条目, 耗时 {:?}",
                stats.idempotency_purged, stats.dlq_purged, stats.duration
            );
        } else {
            debug!("维护完成: 无需清理");
        }

        Ok(stats)
    }
}

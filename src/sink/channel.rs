// ==========================================
// 葡萄酒产线批次系统 - 消息通道
// ==========================================
// MqttChannel: QoS 1 发布，等待 PUBACK（超时即失败）
// HttpChannel: POST JSON，等待响应（非 2xx 即失败）
// 说明: send() 返回前必须拿到对端确认
// ==========================================

use crate::sink::error::{SinkError, SinkResult};
use crate::sink::publish::PublishMessage;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet, QoS};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// MessageChannel Trait
// ==========================================
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// 发送一条消息并等待确认
    async fn send(&self, message: &PublishMessage) -> SinkResult<()>;

    /// 释放连接
    async fn close(&self) -> SinkResult<()> {
        Ok(())
    }
}

// ==========================================
// MQTT
// ==========================================

const MQTT: &str = "mqtt";
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const MQTT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MQTT_REQUEST_CAPACITY: usize = 10;

/// 事件循环转发给发送方的投递事件
#[derive(Debug)]
enum DeliveryEvent {
    Sent(u16),
    Acked(u16),
    ConnectionLost(String),
}

/// 发出报文与 publish 请求的对应关系（跨 send() 调用保留）
///
/// 事件循环按请求顺序首次发出报文；重连后重传的报文沿用原 pkid，
/// 未确认的 pkid 再次出现即视为重传，不占用新请求的位置。
#[derive(Debug, Default)]
struct AckTracker {
    issued: u64,
    claimed: u64,
    unacked: HashSet<u16>,
}

impl AckTracker {
    /// 登记一个已提交的 publish 请求，返回其序号
    fn issue(&mut self) -> u64 {
        let ticket = self.issued;
        self.issued += 1;
        ticket
    }

    /// 报文已发出；首次发出时返回对应请求的序号，重传返回 None
    fn on_sent(&mut self, pkid: u16) -> Option<u64> {
        if !self.unacked.insert(pkid) {
            return None;
        }
        let ticket = self.claimed;
        self.claimed += 1;
        Some(ticket)
    }

    fn on_acked(&mut self, pkid: u16) {
        self.unacked.remove(&pkid);
    }
}

struct Inbox {
    events: mpsc::UnboundedReceiver<DeliveryEvent>,
    tracker: AckTracker,
}

pub struct MqttChannel {
    client: AsyncClient,
    topic: String,
    ack_timeout: Duration,
    inbox: Mutex<Inbox>,
    event_loop: JoinHandle<()>,
}

impl MqttChannel {
    /// 连接 broker 并启动事件循环（须在 tokio 运行时内调用）
    ///
    /// 连接是惰性的: 首次 poll 时才真正建立，断线后事件循环自动重连
    pub fn connect(host: &str, port: u16, topic: impl Into<String>, ack_timeout: Duration) -> Self {
        let client_id = format!("wine-batch-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(MQTT_KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, MQTT_REQUEST_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();

        let event_loop = tokio::spawn(async move {
            loop {
                let forwarded = match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(pkid))) => tx.send(DeliveryEvent::Sent(pkid)),
                    Ok(Event::Incoming(Packet::PubAck(ack))) => tx.send(DeliveryEvent::Acked(ack.pkid)),
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT 已连接");
                        Ok(())
                    }
                    Ok(_) => Ok(()),
                    Err(e) => {
                        let sent = tx.send(DeliveryEvent::ConnectionLost(e.to_string()));
                        tokio::time::sleep(MQTT_RECONNECT_DELAY).await;
                        sent
                    }
                };
                // 通道已释放
                if forwarded.is_err() {
                    break;
                }
            }
        });

        let topic = topic.into();
        info!("MQTT 通道: {}:{} topic={}", host, port, topic);
        Self {
            client,
            topic,
            ack_timeout,
            inbox: Mutex::new(Inbox {
                events: rx,
                tracker: AckTracker::default(),
            }),
            event_loop,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl MessageChannel for MqttChannel {
    fn name(&self) -> &'static str {
        MQTT
    }

    async fn send(&self, message: &PublishMessage) -> SinkResult<()> {
        let payload = serde_json::to_vec(message)?;
        let mut guard = self.inbox.lock().await;
        let inbox = &mut *guard;

        self.client
            .publish(self.topic.clone(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| SinkError::publish(MQTT, e.to_string()))?;
        let ticket = inbox.tracker.issue();

        // 之前超时消息的发出/确认事件也在这里消化
        let wait_for_ack = async {
            let mut pkid = None;
            while let Some(event) = inbox.events.recv().await {
                match event {
                    DeliveryEvent::Sent(id) => {
                        if inbox.tracker.on_sent(id) == Some(ticket) {
                            pkid = Some(id);
                        }
                    }
                    DeliveryEvent::Acked(id) => {
                        inbox.tracker.on_acked(id);
                        if pkid == Some(id) {
                            return Ok(id);
                        }
                    }
                    DeliveryEvent::ConnectionLost(reason) => {
                        warn!("MQTT 连接中断，等待重连: {}", reason)
                    }
                }
            }
            Err(SinkError::publish(MQTT, "事件循环已退出"))
        };

        match tokio::time::timeout(self.ack_timeout, wait_for_ack).await {
            Ok(Ok(pkid)) => {
                debug!("PUBACK 已收到: pkid={}, message={}", pkid, message.message_id);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SinkError::AckTimeout {
                channel: MQTT,
                timeout_ms: self.ack_timeout.as_millis() as u64,
            }),
        }
    }

    async fn close(&self) -> SinkResult<()> {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT 断开连接失败（忽略）: {}", e);
        }
        Ok(())
    }
}

impl Drop for MqttChannel {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

// ==========================================
// HTTP
// ==========================================

const HTTP: &str = "http";

pub struct HttpChannel {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::publish(HTTP, e.to_string()))?;
        let url = url.into();
        info!("HTTP 通道: POST {}", url);
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageChannel for HttpChannel {
    fn name(&self) -> &'static str {
        HTTP
    }

    async fn send(&self, message: &PublishMessage) -> SinkResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::AckTimeout {
                        channel: HTTP,
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    SinkError::publish(HTTP, e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::publish(HTTP, e.to_string()))?;

        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // 后端可能回传预测评分
        let score = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("quality_score").and_then(|s| s.as_f64()));
        match score {
            Some(score) => info!(
                "后端评分: {:.2} (batch={}, message={})",
                score, message.batch_id, message.message_id
            ),
            None => debug!("HTTP {} (message={})", status.as_u16(), message.message_id),
        }
        Ok(())
    }
}

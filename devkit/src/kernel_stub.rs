/*!
Scripted stand-in for the kernel

Accepts connections, records every report a node manages to send, and
answers with whatever the test scripted: a directive, raw bytes, silence,
or an immediate hang-up. Lets agent-side behaviour be tested against a
kernel that misbehaves on purpose.
*/

use nodeflow_contracts::{read_frame, write_frame, Directive, DirectiveReply, FrameLimits, NodeReport};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum StubReply {
    Directive(Directive),
    Raw(Vec<u8>),
    /// Read the report, then hold the connection without answering.
    Silent(Duration),
    /// Close right after accepting, before reading anything.
    Hangup,
}

pub struct StubKernel {
    addr: SocketAddr,
    reply: Arc<Mutex<StubReply>>,
    received: Arc<Mutex<Vec<NodeReport>>>,
    task: JoinHandle<()>,
}

impl StubKernel {
    pub async fn start(reply: StubReply) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let reply = Arc::new(Mutex::new(reply));
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let reply = reply.clone();
            let received = received.clone();
            tokio::spawn(async move {
                while let Ok((stream, peer)) = listener.accept().await {
                    let script = reply.lock().clone();
                    let received = received.clone();
                    tokio::spawn(async move {
                        if let Err(e) = answer(stream, script, &received).await {
                            debug!(%peer, error = %e, "stub connection ended");
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            reply,
            received,
            task,
        })
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Script the answer for connections accepted from now on.
    pub fn set_reply(&self, reply: StubReply) {
        *self.reply.lock() = reply;
    }

    pub fn received(&self) -> Vec<NodeReport> {
        self.received.lock().clone()
    }

    pub fn last_report(&self) -> Option<NodeReport> {
        self.received.lock().last().cloned()
    }
}

impl Drop for StubKernel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(mut stream: TcpStream, script: StubReply, received: &Mutex<Vec<NodeReport>>) -> anyhow::Result<()> {
    if matches!(script, StubReply::Hangup) {
        return Ok(());
    }

    let limits = FrameLimits::default();
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let report: NodeReport = read_frame(&mut reader, &limits).await?;
    received.lock().push(report);

    match script {
        StubReply::Directive(action) => write_frame(&mut writer, &DirectiveReply { action }, &limits).await?,
        StubReply::Raw(bytes) => writer.write_all(&bytes).await?,
        StubReply::Silent(hold) => tokio::time::sleep(hold).await,
        StubReply::Hangup => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixedCounters;
    use nodeflow_agent_host::NodeClient;

    fn client(addr: String) -> NodeClient {
        let limits = FrameLimits {
            max_frame_bytes: 4096,
            io_timeout: Duration::from_millis(200),
        };
        NodeClient::new("node1", Arc::new(FixedCounters::new(10.0, 10.0, 10.0)), addr, limits)
    }

    #[tokio::test]
    async fn test_scripted_directive_is_obeyed() {
        let stub = StubKernel::start(StubReply::Directive(Directive::ReduceLoad)).await.unwrap();
        let client = client(stub.addr());

        // the stub answers regardless of telemetry
        assert_eq!(client.send_report(None).await, Directive::ReduceLoad);
        assert_eq!(stub.received().len(), 1);
        assert_eq!(stub.last_report().unwrap().telemetry.cpu_percent, 10.0);
    }

    #[tokio::test]
    async fn test_misbehaving_kernel_means_offline() {
        let stub = StubKernel::start(StubReply::Hangup).await.unwrap();
        let client = client(stub.addr());
        let before = client.state();

        assert_eq!(client.send_report(None).await, Directive::Offline);

        stub.set_reply(StubReply::Silent(Duration::from_secs(2)));
        assert_eq!(client.send_report(None).await, Directive::Offline);

        stub.set_reply(StubReply::Raw(b"{\"action\":\"explode\"}\n".to_vec()));
        assert_eq!(client.send_report(None).await, Directive::Offline);

        stub.set_reply(StubReply::Raw(b"{\"action\":\"offline\"}\n".to_vec()));
        assert_eq!(client.send_report(None).await, Directive::Offline);

        let after = client.state();
        assert_eq!(after.last_successful_send, before.last_successful_send);
        assert_eq!(after.last_directive, None);
        assert_eq!(stub.received().len(), 3, "hangup reads nothing");
    }
}

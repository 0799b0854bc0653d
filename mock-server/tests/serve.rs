//! Smoke test of `run` over a real socket, independent of the client core.

use mock_server::{run_with_state, AppState, DEFAULT_TOKEN};

fn spawn_server(state: AppState) -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            run_with_state(listener, state).await
        })
        .unwrap();
    });
    addr
}

#[test]
fn serves_over_tcp() {
    let addr = spawn_server(AppState::default());
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut resp = agent
        .get(&format!("http://{addr}/appointments"))
        .header("Authorization", &format!("Bearer {DEFAULT_TOKEN}"))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.body_mut().read_to_string().unwrap(), "[]");

    let resp = agent.get(&format!("http://{addr}/appointments")).call().unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[test]
fn custom_token_is_enforced() {
    let addr = spawn_server(AppState::with_token("other"));
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let resp = agent
        .get(&format!("http://{addr}/appointments"))
        .header("Authorization", &format!("Bearer {DEFAULT_TOKEN}"))
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = agent
        .get(&format!("http://{addr}/appointments"))
        .header("Authorization", "Bearer other")
        .call()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

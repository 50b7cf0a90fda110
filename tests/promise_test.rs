#[cfg(test)]
mod tests {
    use callback_promise::{
        Completer, Error, InlineExecutor, Promise, PromiseError, Status, WorkerPool, Wrapper,
    };
    use futures::executor::block_on;
    use std::io::{self, BufRead, BufReader, Cursor, Read};
    use std::sync::{Arc, Mutex};
    use std::{thread, time::Duration};

    fn fetch_page(address: &str) -> Promise<Cursor<Vec<u8>>> {
        let address = address.to_owned();
        Promise::new(move |completer: Completer<Cursor<Vec<u8>>>| {
            thread::spawn(move || match address.strip_prefix("mem://") {
                Some(body) => completer.resolve(Cursor::new(body.replace('|', "\n").into_bytes())),
                None => completer.reject(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported address {address}"),
                )),
            });
        })
    }

    fn last_line<R: Read + Send + 'static>(stream: R) -> Promise<Option<String>> {
        Wrapper::default().try_wrap(move || -> io::Result<Option<String>> {
            let mut last = None;
            for line in BufReader::new(stream).lines() {
                last = Some(line?);
            }
            Ok(last)
        })
    }

    #[test]
    fn test_wrap_slow_function() {
        let slow = |x: u64, y: u64| {
            thread::sleep(Duration::from_millis(x));
            format!("bla {}", x + y)
        };
        let promise = Wrapper::default().wrap(move || slow(40, 2));
        let result = block_on(promise.waiter()).unwrap();
        assert_eq!(result.as_str(), "bla 42");
        assert_eq!(promise.status(), Status::Fulfilled);
    }

    #[test]
    fn test_hello_world_is_immediately_fulfilled() {
        let hello = Promise::new(|completer| completer.complete(Ok(String::from("Hello World"))));
        assert!(hello.is_fulfilled());
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        hello.success(move |message| *slot.lock().unwrap() = Some(message.clone()));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_fetch_then_read_last_line() {
        let page = fetch_page("mem://<html>|<body>|</html>");
        let last = page.flat_map(|body| last_line(Cursor::new(body.get_ref().clone())));
        let line = block_on(last.waiter()).unwrap();
        assert_eq!(line.as_deref(), Some("</html>"));
    }

    #[test]
    fn test_failed_fetch_skips_dependent_read() {
        let reads = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&reads);
        let page = fetch_page("http://google.com");
        let last = page.flat_map(move |body| {
            *counter.lock().unwrap() += 1;
            last_line(Cursor::new(body.get_ref().clone()))
        });

        let error = block_on(last.waiter()).unwrap_err();
        let source = block_on(page.waiter()).unwrap_err();
        assert!(error.is_same(&source));
        assert_eq!(
            error.downcast_ref::<io::Error>().unwrap().kind(),
            io::ErrorKind::Unsupported
        );
        assert_eq!(*reads.lock().unwrap(), 0);
    }

    #[test]
    fn test_only_success_observer_never_hears_of_failure() {
        let heard = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&heard);
        let promise = Promise::<u32>::rejected("silent");
        promise.success(move |_| *flag.lock().unwrap() = true);
        assert!(!*heard.lock().unwrap());
        assert_eq!(promise.status(), Status::Rejected);
    }

    #[test]
    fn test_long_chain_on_pool_keeps_order_of_steps() {
        let pool = Arc::new(WorkerPool::builder().workers(2).build().unwrap());
        let wrapper = Wrapper::new(Arc::clone(&pool));
        let mut promise = wrapper.wrap(|| vec![0usize]);
        for step in 1..20 {
            let wrapper = wrapper.clone();
            promise = promise.flat_map(move |steps| {
                let mut steps = steps.clone();
                wrapper.wrap(move || {
                    steps.push(step);
                    steps
                })
            });
        }
        let steps = block_on(promise.waiter()).unwrap();
        assert_eq!(*steps, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_map_rejection_from_transform() {
        let promise = Wrapper::new(InlineExecutor)
            .wrap(|| String::from("not a number"))
            .try_map(|text| text.parse::<i64>().map_err(PromiseError::new));
        assert!(promise.is_rejected());
    }

    #[test]
    fn test_race_between_registration_and_completion() {
        for _ in 0..100 {
            let hits = Arc::new(Mutex::new(Vec::new()));
            let promise = Wrapper::default().wrap(|| 1u8);
            let log = Arc::clone(&hits);
            promise.success(move |value| log.lock().unwrap().push(*value));
            block_on(promise.waiter()).unwrap();
            assert_eq!(*hits.lock().unwrap(), vec![1]);
        }
    }

    #[test]
    fn test_abandoned_resolver_rejects() {
        let promise = Promise::<u32>::new(|completer| {
            thread::spawn(move || drop(completer));
        });
        let error = block_on(promise.waiter()).unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::Abandoned)));
    }
}
